//! # Frame Transformations
//!
//! Lab frame ↔ co-moving frame conversions in homologous flow.
//!
//! ## Theory
//!
//! In homologous expansion the local velocity is `v = r / t`, so
//! `β = r / (c t)`. A photon travelling at angle `μ` to the radial direction
//! sees the co-moving frequency
//!
//! ```text
//! ν_cmf = ν_lab · γ (1 − μ β)        (full relativity)
//! ν_cmf ≈ ν_lab · (1 − μ β)          (first order in β)
//! ```
//!
//! ## References
//!
//! 1. Rybicki & Lightman, "Radiative Processes in Astrophysics", ch. 4 (1979)
//! 2. Mihalas & Mihalas, "Foundations of Radiation Hydrodynamics", §89 (1984)

use crate::constants::C_SPEED_OF_LIGHT;

/// Expansion velocity in units of c at radius `r` (cm) and time `t` (s)
#[inline]
pub fn beta(r: f64, time_explosion: f64) -> f64 {
    r / (time_explosion * C_SPEED_OF_LIGHT)
}

/// Lab → co-moving frequency/energy ratio
#[inline]
pub fn doppler_factor(r: f64, mu: f64, time_explosion: f64, full_relativity: bool) -> f64 {
    let beta = beta(r, time_explosion);
    if full_relativity {
        (1.0 - mu * beta) / (1.0 - beta * beta).sqrt()
    } else {
        1.0 - mu * beta
    }
}

/// Co-moving → lab frequency/energy ratio
///
/// `mu` is the lab-frame direction under partial relativity and the
/// co-moving direction under full relativity.
#[inline]
pub fn inverse_doppler_factor(r: f64, mu: f64, time_explosion: f64, full_relativity: bool) -> f64 {
    let beta = beta(r, time_explosion);
    if full_relativity {
        (1.0 + mu * beta) / (1.0 - beta * beta).sqrt()
    } else {
        1.0 / (1.0 - mu * beta)
    }
}

/// Direction cosine seen in the lab for a co-moving direction `mu`
pub fn angle_aberration_cmf_to_lf(r: f64, mu: f64, time_explosion: f64) -> f64 {
    let beta = beta(r, time_explosion);
    (mu + beta) / (1.0 + beta * mu)
}

/// Direction cosine seen in the co-moving frame for a lab direction `mu`
pub fn angle_aberration_lf_to_cmf(r: f64, mu: f64, time_explosion: f64) -> f64 {
    let beta = beta(r, time_explosion);
    (mu - beta) / (1.0 - beta * mu)
}
