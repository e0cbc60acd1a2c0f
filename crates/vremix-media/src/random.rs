//! Injectable randomness for parameter sampling and filter picks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform random draws.
///
/// All draws in a batch go through one instance, so a seeded source makes a
/// whole batch reproducible.
pub trait RandomSource: Send {
    /// Uniform integer in `[min, max]`. Returns `min` when `max < min`.
    fn int_inclusive(&mut self, min: u32, max: u32) -> u32;

    /// Uniform float in `[min, max]`. Returns `min` when `max <= min`.
    fn float_range(&mut self, min: f64, max: f64) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize;
}

/// `RandomSource` backed by the standard RNG.
#[derive(Debug, Clone)]
pub struct StdRandom(StdRng);

impl StdRandom {
    /// Seed from the operating system.
    pub fn from_os() -> Self {
        Self(StdRng::from_os_rng())
    }

    /// Deterministic source for reproducible runs and tests.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_os()
    }
}

impl RandomSource for StdRandom {
    fn int_inclusive(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        self.0.random_range(min..=max)
    }

    fn float_range(&mut self, min: f64, max: f64) -> f64 {
        if min.is_nan() || max.is_nan() || max <= min {
            return min;
        }
        self.0.random_range(min..=max)
    }

    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.0.random_range(0..len)
    }
}
