//! # Model Snapshot
//!
//! Geometry and opacities of one iteration bundled together, as handed over by
//! the model and plasma builders.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::C_SPEED_OF_LIGHT;
use crate::error::{Result, TransportError};
use crate::geometry::ShellGeometry;
use crate::plasma::OpacityTables;

/// Everything the kernel reads during one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub geometry: ShellGeometry,
    pub opacity: OpacityTables,
}

impl ModelSnapshot {
    /// Bundle and validate
    pub fn new(geometry: ShellGeometry, opacity: OpacityTables) -> Result<Self> {
        let model = Self { geometry, opacity };
        model.validate()?;
        Ok(model)
    }

    /// Validate both parts and check they describe the same shells
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.opacity.validate()?;
        if self.geometry.n_shells() != self.opacity.n_shells() {
            return Err(TransportError::invalid_model(format!(
                "geometry has {} shells but opacity tables have {}",
                self.geometry.n_shells(),
                self.opacity.n_shells()
            )));
        }
        Ok(())
    }

    /// Load and validate a JSON snapshot
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let model: ModelSnapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        model.validate()?;
        Ok(model)
    }

    /// Write the snapshot as JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn n_shells(&self) -> usize {
        self.geometry.n_shells()
    }

    pub fn n_lines(&self) -> usize {
        self.opacity.n_lines()
    }

    pub fn time_explosion(&self) -> f64 {
        self.geometry.time_explosion
    }

    /// Small synthetic ejecta for demonstrations and tests
    ///
    /// Shells evenly spaced between 11 000 and 20 000 km/s, electron density
    /// following a `ρ ∝ v⁻⁷ t⁻³` power law, and `n_lines` lines log-spaced
    /// between 3×10¹⁵ and 3×10¹⁴ Hz whose Sobolev depths fall off outward.
    pub fn homologous_demo(n_shells: usize, n_lines: usize, time_explosion: f64) -> Result<Self> {
        if n_shells == 0 || n_lines == 0 {
            return Err(TransportError::invalid_model("demo model needs shells and lines"));
        }
        let (v_min, v_max) = (1.1e9, 2.0e9);
        let velocities: Vec<f64> = (0..=n_shells)
            .map(|i| v_min + (v_max - v_min) * i as f64 / n_shells as f64)
            .collect();
        let geometry = ShellGeometry::homologous(&velocities, time_explosion)?;

        let t_ref = 13.0 * 86_400.0;
        let v_mid: Vec<f64> = velocities.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let electron_density: Vec<f64> = v_mid
            .iter()
            .map(|v| 2e9 * (v / v_min).powi(-7) * (time_explosion / t_ref).powi(-3))
            .collect();

        let (nu_hi, nu_lo) = (3e15_f64, 3e14_f64);
        let line_nu: Vec<f64> = (0..n_lines)
            .map(|i| {
                let f = if n_lines == 1 { 0.0 } else { i as f64 / (n_lines - 1) as f64 };
                nu_hi * (nu_lo / nu_hi).powf(f)
            })
            .collect();

        let mut tau_sobolev = Vec::with_capacity(n_lines * n_shells);
        for line in 0..n_lines {
            // Deterministic spread of line strengths over five decades
            let strength = 10f64.powf(2.0 - ((line * 7919) % 101) as f64 / 20.0);
            for v in &v_mid {
                tau_sobolev.push(strength * (v_min / v).powi(5));
            }
        }

        let opacity = OpacityTables::new(line_nu, tau_sobolev, electron_density)?;
        Self::new(geometry, opacity)
    }

    /// Velocity at the outer edge (cm/s)
    pub fn v_outer(&self) -> f64 {
        self.geometry.r_outer[self.n_shells() - 1] / self.time_explosion()
    }

    /// Outer edge speed as a fraction of c
    pub fn beta_outer(&self) -> f64 {
        self.v_outer() / C_SPEED_OF_LIGHT
    }
}
