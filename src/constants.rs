//! # Physical Constants
//!
//! CGS constants used by the packet transport and the packet source.

// ============================================================================
// FUNDAMENTAL CONSTANTS (CGS)
// ============================================================================

/// Speed of light (cm/s)
pub const C_SPEED_OF_LIGHT: f64 = 2.997_924_58e10;

/// Thomson cross section σ_T (cm²)
pub const SIGMA_THOMSON: f64 = 6.652_458_732e-25;

/// Boltzmann constant (erg/K)
pub const K_B: f64 = 1.380_649e-16;

/// Planck constant (erg·s)
pub const H_PLANCK: f64 = 6.626_070_15e-27;

// ============================================================================
// TRANSPORT CONSTANTS
// ============================================================================

/// Distance reported for events that can never happen (cm)
pub const MISS_DISTANCE: f64 = 1e99;

/// Relative frequency offset below which a packet is considered to sit on a line
pub const CLOSE_LINE_THRESHOLD: f64 = 1e-7;

/// Negative boundary distances down to `-r × BOUNDARY_ROUNDOFF` are rounding
/// noise of a packet sitting on a shell edge and are read as zero
pub const BOUNDARY_ROUNDOFF: f64 = 1e-12;
