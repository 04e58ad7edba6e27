//! # Geometry Module
//!
//! Radial shell grid and the three distance calculators used by the trace step.
//!
//! ## Distances
//!
//! ```text
//! boundary:  straight line to the inner or outer sphere of the current shell
//! electron:  d = τ / (n_e σ_T)
//! line:      d at which the co-moving frequency redshifts onto ν_line
//! ```
//!
//! All lengths are in cm, times in s.
//!
//! ## References
//!
//! 1. Lucy, "Computing radiative equilibria with Monte Carlo techniques", A&A 344 (1999)
//! 2. Kerzendorf & Sim, "A spectral synthesis code for rapid modelling of supernovae",
//!    MNRAS 440 (2014)

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::constants::{CLOSE_LINE_THRESHOLD, C_SPEED_OF_LIGHT, MISS_DISTANCE, SIGMA_THOMSON};
use crate::error::{Result, TransportError};

/// Shell index change when leaving through the outer sphere
pub const OUTWARD: i32 = 1;

/// Shell index change when leaving through the inner sphere
pub const INWARD: i32 = -1;

// ============================================================================
// SHELL GRID
// ============================================================================

/// Radial shell grid at one time since explosion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellGeometry {
    /// Inner radius of each shell (cm)
    pub r_inner: Vec<f64>,
    /// Outer radius of each shell (cm)
    pub r_outer: Vec<f64>,
    /// Time since explosion (s)
    pub time_explosion: f64,
}

impl ShellGeometry {
    /// Create a validated grid
    pub fn new(r_inner: Vec<f64>, r_outer: Vec<f64>, time_explosion: f64) -> Result<Self> {
        let geometry = Self {
            r_inner,
            r_outer,
            time_explosion,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Homologous grid from shell boundary velocities `v[0] < v[1] < … < v[n]` (cm/s)
    pub fn homologous(velocities: &[f64], time_explosion: f64) -> Result<Self> {
        if velocities.len() < 2 {
            return Err(TransportError::invalid_model(
                "need at least two boundary velocities",
            ));
        }
        let radii: Vec<f64> = velocities.iter().map(|v| v * time_explosion).collect();
        Self::new(
            radii[..radii.len() - 1].to_vec(),
            radii[1..].to_vec(),
            time_explosion,
        )
    }

    /// Check `0 < r_inner[i] < r_outer[i] = r_inner[i+1]` and `t > 0`
    pub fn validate(&self) -> Result<()> {
        if self.r_inner.is_empty() {
            return Err(TransportError::invalid_model("shell grid is empty"));
        }
        if self.r_inner.len() != self.r_outer.len() {
            return Err(TransportError::invalid_model(format!(
                "{} inner radii but {} outer radii",
                self.r_inner.len(),
                self.r_outer.len()
            )));
        }
        if !(self.time_explosion.is_finite() && self.time_explosion > 0.0) {
            return Err(TransportError::invalid_model(format!(
                "time_explosion must be positive, got {}",
                self.time_explosion
            )));
        }
        for (i, (&inner, &outer)) in self.r_inner.iter().zip(&self.r_outer).enumerate() {
            if !(inner > 0.0 && inner < outer && outer.is_finite()) {
                return Err(TransportError::invalid_model(format!(
                    "shell {i}: need 0 < r_inner = {inner:e} < r_outer = {outer:e}"
                )));
            }
            if i + 1 < self.r_inner.len() && self.r_inner[i + 1] != outer {
                return Err(TransportError::invalid_model(format!(
                    "shell {i}: r_outer = {outer:e} does not meet r_inner of shell {} = {:e}",
                    i + 1,
                    self.r_inner[i + 1]
                )));
            }
        }
        Ok(())
    }

    /// Number of shells
    pub fn n_shells(&self) -> usize {
        self.r_inner.len()
    }

    /// Shell containing radius `r`, inner edges belong to the shell above
    pub fn shell_containing(&self, r: f64) -> Option<usize> {
        let n = self.n_shells();
        if r < self.r_inner[0] || r > self.r_outer[n - 1] {
            return None;
        }
        let idx = self.r_outer.partition_point(|&outer| outer <= r);
        Some(idx.min(n - 1))
    }

    /// Shell volume (cm³)
    pub fn volume(&self, shell: usize) -> f64 {
        4.0 / 3.0 * PI * (self.r_outer[shell].powi(3) - self.r_inner[shell].powi(3))
    }
}

// ============================================================================
// DISTANCE CALCULATORS
// ============================================================================

/// Distance to the shell boundary and the shell index change on reaching it
///
/// Outward-moving packets always hit the outer sphere. Inward-moving packets
/// hit the inner sphere if their ray intersects it, else they pass the
/// tangent point and leave through the outer sphere.
pub fn distance_boundary(r: f64, mu: f64, r_inner: f64, r_outer: f64) -> (f64, i32) {
    let mu_term = (mu * mu - 1.0) * r * r;

    if mu > 0.0 {
        ((r_outer * r_outer + mu_term).sqrt() - r * mu, OUTWARD)
    } else {
        let check = r_inner * r_inner + mu_term;
        if check >= 0.0 {
            (-r * mu - check.sqrt(), INWARD)
        } else {
            ((r_outer * r_outer + mu_term).sqrt() - r * mu, OUTWARD)
        }
    }
}

/// Distance over which electron scattering accumulates optical depth `tau`
pub fn distance_electron(electron_density: f64, tau: f64) -> f64 {
    if electron_density <= 0.0 {
        return MISS_DISTANCE;
    }
    tau / (electron_density * SIGMA_THOMSON)
}

/// Electron-scattering optical depth along `distance`
pub fn tau_electron(electron_density: f64, distance: f64) -> f64 {
    electron_density * SIGMA_THOMSON * distance
}

/// Distance until the co-moving frequency reaches `nu_line`
///
/// Returns 0 when the packet already sits on the resonance (within
/// [`CLOSE_LINE_THRESHOLD`]). A negative result means the line is already
/// behind the packet; the caller treats that as a fatal inconsistency. The
/// last line of the list gets no resonance snapping, and if it is already
/// behind the packet it reports [`MISS_DISTANCE`].
#[allow(clippy::too_many_arguments)]
pub fn distance_line(
    nu: f64,
    comov_nu: f64,
    nu_line: f64,
    is_last_line: bool,
    r: f64,
    mu: f64,
    time_explosion: f64,
    full_relativity: bool,
) -> f64 {
    let ct = C_SPEED_OF_LIGHT * time_explosion;
    let mut nu_diff = comov_nu - nu_line;

    if !is_last_line && (nu_diff / nu).abs() < CLOSE_LINE_THRESHOLD {
        nu_diff = 0.0;
    }

    if nu_diff < 0.0 {
        return if is_last_line {
            MISS_DISTANCE
        } else {
            nu_diff / nu * ct
        };
    }
    if nu_diff == 0.0 {
        return 0.0;
    }

    if full_relativity {
        distance_line_full_relativity(nu_line, nu, r, mu, ct)
    } else {
        nu_diff / nu * ct
    }
}

/// Exact solution of `ν γ (1 − β·n) = ν_line` along the ray
///
/// With `x` the projection of the position on the direction of flight and
/// `b² = r²(1 − μ²)` the squared impact parameter:
///
/// ```text
/// (1 + ν_r²) x² − 2 ct x + ct²(1 − ν_r²) + ν_r² b² = 0,   ν_r = ν_line / ν
/// ```
fn distance_line_full_relativity(nu_line: f64, nu: f64, r: f64, mu: f64, ct: f64) -> f64 {
    let nu_r = nu_line / nu;
    let nu_r_sq = nu_r * nu_r;
    let impact_sq = r * r * (1.0 - mu * mu);
    let root = (ct * ct - (1.0 + 1.0 / nu_r_sq) * impact_sq).sqrt();
    (ct - nu_r_sq * root) / (1.0 + nu_r_sq) - mu * r
}
