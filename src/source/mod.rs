//! # Packet Source
//!
//! Launches packets from the photosphere at the inner boundary.
//!
//! Frequencies follow a Planck spectrum at the inner temperature, sampled with
//! the series method of Bjorkman & Wood (2001): with `ξ₀…ξ₄` uniform, pick the
//! smallest `l` such that `Σ_{i≤l} i⁻⁴ ≥ ξ₀ π⁴/90`, then
//!
//! ```text
//! x = −ln(ξ₁ ξ₂ ξ₃ ξ₄) / l,      ν = x k_B T / h
//! ```
//!
//! Directions are drawn from `μ = √ξ` (outward flux through a surface) and every
//! packet carries energy `1/N`. Frequencies and energies are co-moving; the
//! driver converts them to the lab frame before the first trace.

use std::f64::consts::PI;

use crate::constants::{H_PLANCK, K_B};
use crate::packet::RPacket;
use crate::stochastic::{RandomGenerator, RandomSource};

/// Terms of the `Σ i⁻⁴` series before giving up
const L_SAMPLES: u32 = 1000;

/// ChaCha stream reserved for packet creation
const SOURCE_STREAM: u64 = 1;

/// Creates the packets of one iteration
pub trait PacketSource {
    /// `n` fresh packets, indexed `0..n`
    fn create_packets(&self, n: usize, seed: u64) -> Vec<RPacket>;
}

/// Blackbody emitter on a sphere
#[derive(Debug, Clone, Copy)]
pub struct BlackBodySource {
    /// Emitting radius (cm)
    pub radius: f64,
    /// Temperature (K)
    pub temperature: f64,
}

impl BlackBodySource {
    pub fn new(radius: f64, temperature: f64) -> Self {
        Self { radius, temperature }
    }

    /// Planck-distributed frequency (Hz)
    pub fn sample_nu<R: RandomSource + ?Sized>(&self, rng: &mut R) -> f64 {
        let target = rng.uniform() * PI.powi(4) / 90.0;

        let mut l = 1;
        let mut sum = 0.0;
        while l < L_SAMPLES {
            sum += 1.0 / (l as f64).powi(4);
            if sum >= target {
                break;
            }
            l += 1;
        }

        let xis_prod = rng.uniform() * rng.uniform() * rng.uniform() * rng.uniform();
        let x = -xis_prod.ln() / l as f64;
        x * K_B * self.temperature / H_PLANCK
    }

    /// Outward direction cosine
    pub fn sample_mu<R: RandomSource + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.uniform().sqrt()
    }
}

impl PacketSource for BlackBodySource {
    fn create_packets(&self, n: usize, seed: u64) -> Vec<RPacket> {
        let mut rng = RandomGenerator::with_stream(seed, SOURCE_STREAM);
        let energy = 1.0 / n as f64;

        (0..n)
            .map(|i| {
                let nu = self.sample_nu(&mut rng);
                let mu = self.sample_mu(&mut rng);
                RPacket::new(i as u64, self.radius, mu, nu, energy, 0)
            })
            .collect()
    }
}
