//! # Stochastic Module
//!
//! Random sources for the transport kernel.
//!
//! The kernel never touches a global generator: every draw goes through a
//! [`RandomSource`] handed in by the caller, so a run is reproducible from its
//! seed and tests can replay an exact sequence with [`FixedSequence`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Smallest uniform variate handed out, keeps `-ln(U)` finite
const MIN_UNIFORM: f64 = 1e-300;

/// ChaCha streams below this one are reserved for packet sources
pub const FIRST_PACKET_STREAM: u64 = 2;

/// Uniform random source consumed by the kernel and the resolvers
pub trait RandomSource {
    /// Uniform variate in (0, 1)
    fn uniform(&mut self) -> f64;

    /// Exponential(1) optical depth `-ln(U)`
    fn tau_event(&mut self) -> f64 {
        -self.uniform().ln()
    }

    /// Isotropic direction cosine in [-1, 1)
    fn random_mu(&mut self) -> f64 {
        2.0 * self.uniform() - 1.0
    }
}

/// Seedable pseudo-random generator (ChaCha8)
#[derive(Clone, Debug)]
pub struct RandomGenerator {
    rng: ChaCha8Rng,
}

impl RandomGenerator {
    /// Create new RNG with seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generator on an independent ChaCha stream of the same seed
    pub fn with_stream(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self { rng }
    }

    /// Generator for packet `index` of a run seeded with `seed`
    ///
    /// Each packet gets its own stream of the run seed, so runs with
    /// neighbouring seeds share no draws.
    pub fn for_packet(seed: u64, index: u64) -> Self {
        Self::with_stream(seed, index.wrapping_add(FIRST_PACKET_STREAM))
    }

    /// Generate uniform in range [a, b)
    pub fn uniform_range(&mut self, a: f64, b: f64) -> f64 {
        a + (b - a) * self.uniform()
    }

    /// Generate exponential distribution with rate λ
    pub fn exponential(&mut self, lambda: f64) -> f64 {
        -self.uniform().ln() / lambda
    }
}

impl RandomSource for RandomGenerator {
    #[inline]
    fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>().max(MIN_UNIFORM)
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(42) // Reproducible default
    }
}

/// Replays a fixed list of uniforms, cycling when exhausted
#[derive(Clone, Debug)]
pub struct FixedSequence {
    values: Vec<f64>,
    cursor: usize,
}

impl FixedSequence {
    /// Sequence over `values`; each must lie in (0, 1]
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "fixed sequence needs at least one value");
        Self { values, cursor: 0 }
    }

    /// Sequence that always returns `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Uniform that yields exactly `tau` from [`RandomSource::tau_event`]
    pub fn for_tau(tau: f64) -> Self {
        Self::constant((-tau).exp())
    }

    /// Number of draws taken so far
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for FixedSequence {
    fn uniform(&mut self) -> f64 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
