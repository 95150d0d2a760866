// src/rng.rs
//! Random Number Generation for Monte Carlo Simulations
//!
//! # Design Philosophy
//!
//! 1. **Reproducibility**: Same seed → same paths, independent of thread count
//! 2. **Parallel safety**: every path owns its own generator, no shared state
//! 3. **Independence**: different base seeds give statistically independent ensembles
//!
//! # Per-path seeding
//!
//! Each path gets a `StdRng` whose seed is a splitmix64 mix of the base seed
//! and the path index:
//! ```text
//! z = base_seed + golden_gamma * (path + 1)
//! z = (z ⊕ (z >> 30)) * 0xbf58476d1ce4e5b9
//! z = (z ⊕ (z >> 27)) * 0x94d049bb133111eb
//! seed = z ⊕ (z >> 31)
//! ```
//! Mixing avoids the overlap of plain `seed + path` schemes, where seed `s`
//! path `1` and seed `s + 1` path `0` would share a stream.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// splitmix64 finalizer applied to `base_seed` and a stream index
pub fn splitmix64(base_seed: u64, stream: u64) -> u64 {
    let mut z = base_seed.wrapping_add(GOLDEN_GAMMA.wrapping_mul(stream.wrapping_add(1)));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9u64);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111ebu64);
    z ^ (z >> 31)
}

/// RNG factory for reproducible parallel simulations
#[derive(Debug, Clone, Copy)]
pub struct RngFactory {
    base_seed: u64,
}

impl RngFactory {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Generator owned by a single path
    pub fn path_rng(&self, path: u64) -> StdRng {
        StdRng::seed_from_u64(splitmix64(self.base_seed, path))
    }
}

pub fn get_normal_draw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}
