//! # Plasma Opacity Tables
//!
//! Line list and continuum opacities frozen for one iteration.
//!
//! The line list is sorted by strictly decreasing rest-frame frequency, which is
//! the order in which an outward-redshifting packet meets the resonances. Sobolev
//! optical depths are stored line-major: `tau_sobolev[line * n_shells + shell]`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Opacity state read by the trace step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpacityTables {
    /// Rest-frame line frequencies (Hz), strictly descending
    pub line_nu: Vec<f64>,
    /// Sobolev optical depths, line-major `[n_lines × n_shells]`
    pub tau_sobolev: Vec<f64>,
    /// Free electron number density per shell (cm⁻³)
    pub electron_density: Vec<f64>,
}

impl OpacityTables {
    /// Create validated tables
    pub fn new(line_nu: Vec<f64>, tau_sobolev: Vec<f64>, electron_density: Vec<f64>) -> Result<Self> {
        let tables = Self {
            line_nu,
            tau_sobolev,
            electron_density,
        };
        tables.validate()?;
        Ok(tables)
    }

    /// Tables with no electrons and the given line list, all optical depths `tau`
    pub fn uniform(line_nu: Vec<f64>, n_shells: usize, tau: f64, electron_density: f64) -> Result<Self> {
        let tau_sobolev = vec![tau; line_nu.len() * n_shells];
        Self::new(line_nu, tau_sobolev, vec![electron_density; n_shells])
    }

    /// Number of lines
    pub fn n_lines(&self) -> usize {
        self.line_nu.len()
    }

    /// Number of shells
    pub fn n_shells(&self) -> usize {
        self.electron_density.len()
    }

    /// Sobolev optical depth of `line` in `shell`
    #[inline]
    pub fn tau_sobolev(&self, line: usize, shell: usize) -> f64 {
        self.tau_sobolev[line * self.n_shells() + shell]
    }

    /// Index of the first line redward of `comov_nu`
    ///
    /// Lines at exactly `comov_nu` count as already passed.
    pub fn first_line_below(&self, comov_nu: f64) -> usize {
        self.line_nu.partition_point(|&nu| nu >= comov_nu)
    }

    /// Check sorting, shapes and signs
    pub fn validate(&self) -> Result<()> {
        if self.line_nu.is_empty() {
            return Err(TransportError::invalid_model("line list is empty"));
        }
        if self.electron_density.is_empty() {
            return Err(TransportError::invalid_model("no shells in opacity tables"));
        }
        if let Some(i) = self.line_nu.windows(2).position(|w| !(w[0] > w[1])) {
            return Err(TransportError::invalid_model(format!(
                "line list not strictly descending at line {}: {:e} then {:e}",
                i,
                self.line_nu[i],
                self.line_nu[i + 1]
            )));
        }
        if let Some(nu) = self.line_nu.iter().find(|nu| !(nu.is_finite() && **nu > 0.0)) {
            return Err(TransportError::invalid_model(format!(
                "line frequency {nu:e} must be positive"
            )));
        }
        let expected = self.n_lines() * self.n_shells();
        if self.tau_sobolev.len() != expected {
            return Err(TransportError::invalid_model(format!(
                "tau_sobolev has {} entries, expected {} lines × {} shells",
                self.tau_sobolev.len(),
                self.n_lines(),
                self.n_shells()
            )));
        }
        if let Some(i) = self.tau_sobolev.iter().position(|t| !(*t >= 0.0)) {
            return Err(TransportError::invalid_model(format!(
                "negative Sobolev optical depth at line {}, shell {}",
                i / self.n_shells(),
                i % self.n_shells()
            )));
        }
        if let Some(shell) = self.electron_density.iter().position(|n| !(n.is_finite() && *n >= 0.0)) {
            return Err(TransportError::invalid_model(format!(
                "negative electron density in shell {shell}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> OpacityTables {
        OpacityTables::new(
            vec![3e15, 2e15, 1e15],
            vec![0.1, 0.2, 1.1, 1.2, 2.1, 2.2],
            vec![1e8, 2e8],
        )
        .unwrap()
    }

    #[test]
    fn test_line_major_layout() {
        let t = tables();
        assert_eq!(t.n_lines(), 3);
        assert_eq!(t.n_shells(), 2);
        assert_eq!(t.tau_sobolev(0, 1), 0.2);
        assert_eq!(t.tau_sobolev(2, 0), 2.1);
    }

    #[test]
    fn test_first_line_below() {
        let t = tables();
        assert_eq!(t.first_line_below(4e15), 0);
        assert_eq!(t.first_line_below(2.5e15), 1);
        assert_eq!(t.first_line_below(2e15), 2);
        assert_eq!(t.first_line_below(0.5e15), 3);
    }

    #[test]
    fn test_validate() {
        assert!(OpacityTables::new(vec![], vec![], vec![1.0]).is_err());
        assert!(OpacityTables::new(vec![1e15, 2e15], vec![0.0, 0.0], vec![1.0]).is_err());
        assert!(OpacityTables::new(vec![2e15, 1e15], vec![0.0], vec![1.0]).is_err());
        assert!(OpacityTables::new(vec![2e15, 1e15], vec![0.0, -1.0], vec![1.0]).is_err());
        assert!(OpacityTables::new(vec![2e15, 1e15], vec![0.0, 1.0], vec![-1.0]).is_err());
        assert!(OpacityTables::uniform(vec![2e15, 1e15], 4, 0.5, 0.0).is_ok());
    }
}
