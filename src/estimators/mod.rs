//! # Estimators
//!
//! Track-length estimators of the radiation field, accumulated while packets
//! fly and read by the plasma solver between iterations.
//!
//! ```text
//! J     += E_cmf · ℓ              (per shell)
//! ν̄     += E_cmf · ℓ · ν_cmf      (per shell)
//! J_blue += E_line / ν            (per line, shell)
//! Ė_lu  += E_line                 (per line, shell)
//! ```
//!
//! Updates are additions only; the kernel never reads them back. Each worker
//! owns one copy and copies are summed with [`Estimators::merge`].

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::constants::C_SPEED_OF_LIGHT;
use crate::frame::doppler_factor;
use crate::packet::RPacket;

/// Radiation-field and line estimators for one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimators {
    n_shells: usize,
    n_lines: usize,
    /// Mean intensity estimator per shell
    pub j: Vec<f64>,
    /// Frequency-weighted mean intensity estimator per shell
    pub nu_bar: Vec<f64>,
    /// Blue-wing intensity per line and shell, line-major
    pub j_blue: Vec<f64>,
    /// Energy deposited per line and shell, line-major
    pub edot_lu: Vec<f64>,
}

impl Estimators {
    /// Zeroed estimators
    pub fn new(n_shells: usize, n_lines: usize) -> Self {
        Self {
            n_shells,
            n_lines,
            j: vec![0.0; n_shells],
            nu_bar: vec![0.0; n_shells],
            j_blue: vec![0.0; n_lines * n_shells],
            edot_lu: vec![0.0; n_lines * n_shells],
        }
    }

    pub fn n_shells(&self) -> usize {
        self.n_shells
    }

    pub fn n_lines(&self) -> usize {
        self.n_lines
    }

    /// Flux-moment contribution of a flight of physical length `distance`
    #[inline]
    pub fn increment_radiation_field(&mut self, shell: usize, distance: f64, comov_nu: f64, comov_energy: f64) {
        let weight = comov_energy * distance;
        self.j[shell] += weight;
        self.nu_bar[shell] += weight * comov_nu;
    }

    /// Line-rate contribution of a packet passing `line` in `shell`
    #[inline]
    pub fn increment_line(&mut self, line: usize, shell: usize, energy: f64, nu: f64) {
        let idx = line * self.n_shells + shell;
        self.j_blue[idx] += energy / nu;
        self.edot_lu[idx] += energy;
    }

    /// Line estimator update for a packet whose resonance lies `distance_trace` ahead
    ///
    /// The packet energy is taken in the co-moving frame at the resonance point:
    /// to first order `1 − (d + μ r)/(c t)`, exactly the local Doppler factor under
    /// full relativity.
    pub fn update_line(
        &mut self,
        packet: &RPacket,
        line: usize,
        distance_trace: f64,
        time_explosion: f64,
        full_relativity: bool,
    ) {
        let factor = if full_relativity {
            doppler_factor(packet.r, packet.mu, time_explosion, true)
        } else {
            1.0 - (distance_trace + packet.mu * packet.r) / (time_explosion * C_SPEED_OF_LIGHT)
        };
        self.increment_line(line, packet.current_shell_id, packet.energy * factor, packet.nu);
    }

    /// `j_blue` of `line` in `shell`
    pub fn j_blue(&self, line: usize, shell: usize) -> f64 {
        self.j_blue[line * self.n_shells + shell]
    }

    /// `edot_lu` of `line` in `shell`
    pub fn edot_lu(&self, line: usize, shell: usize) -> f64 {
        self.edot_lu[line * self.n_shells + shell]
    }

    /// Add another worker's accumulation into this one
    ///
    /// Panics if the shapes differ.
    pub fn merge(&mut self, other: &Estimators) {
        assert_eq!(
            (self.n_shells, self.n_lines),
            (other.n_shells, other.n_lines),
            "estimator shapes differ"
        );
        add_into(&mut self.j, &other.j);
        add_into(&mut self.nu_bar, &other.nu_bar);
        add_into(&mut self.j_blue, &other.j_blue);
        add_into(&mut self.edot_lu, &other.edot_lu);
    }

    /// Every cell is zero
    pub fn is_empty(&self) -> bool {
        [&self.j, &self.nu_bar, &self.j_blue, &self.edot_lu]
            .iter()
            .all(|v| v.iter().all(|&x| x == 0.0))
    }
}

impl AddAssign<&Estimators> for Estimators {
    fn add_assign(&mut self, other: &Estimators) {
        self.merge(other);
    }
}

fn add_into(dst: &mut [f64], src: &[f64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}
