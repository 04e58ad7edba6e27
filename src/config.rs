//! # Run Configuration
//!
//! Immutable settings threaded explicitly through the kernel, plus the
//! per-iteration run parameters consumed by the driver and the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Physics switches read by the kernel on every step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Exact special-relativistic Doppler shifts, aberration and length contraction
    pub full_relativity: bool,
    /// Make every line transparent (diagnostic knob)
    pub disable_line_scattering: bool,
}

/// How a packet re-emerges from a line interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineInteraction {
    /// Resonant scattering: re-emission in the absorbing line
    #[default]
    Scatter,
    /// Downbranching (needs the external macro-atom data)
    Downbranch,
    /// Full macro-atom (needs the external macro-atom data)
    Macroatom,
}

/// Parameters of one Monte Carlo iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of packets launched from the inner boundary
    pub n_packets: usize,
    /// Base RNG seed; packet `i` draws from ChaCha stream `i + 2` of it
    pub seed: u64,
    /// Worker threads (0 = rayon default)
    pub n_threads: usize,
    /// Interaction cap per packet before it is abandoned
    pub max_interactions: usize,
    /// Photospheric temperature at the inner boundary (K)
    pub t_inner: f64,
    /// Line interaction treatment
    pub line_interaction: LineInteraction,
    /// Kernel switches
    pub settings: TransportSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_packets: 100_000,
            seed: 23_111_963,
            n_threads: 0,
            max_interactions: 100_000,
            t_inner: 10_000.0,
            line_interaction: LineInteraction::Scatter,
            settings: TransportSettings::default(),
        }
    }
}

impl RunConfig {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that would otherwise surface deep inside the kernel
    pub fn validate(&self) -> Result<()> {
        if self.n_packets == 0 {
            return Err(TransportError::config("n_packets must be positive"));
        }
        if self.max_interactions == 0 {
            return Err(TransportError::config("max_interactions must be positive"));
        }
        if !(self.t_inner.is_finite() && self.t_inner > 0.0) {
            return Err(TransportError::config(format!(
                "t_inner must be a positive temperature, got {}",
                self.t_inner
            )));
        }
        Ok(())
    }
}
