//! Random number wiring.
//!
//! Airport inflation always runs on a seeded [`SynthRng`] so output is stable
//! across runs. Route synthesis accepts any `Rng`; production wiring passes
//! ambient randomness, tests pass a seeded generator.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub type SynthRng = ChaCha8Rng;

pub fn seeded(seed: u64) -> SynthRng {
    SynthRng::seed_from_u64(seed)
}

/// Uniform draw in `[0, 1)`.
#[inline]
pub fn unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(0.0..1.0)
}

/// Uniform index in `0..len`. `len` must be non-zero.
#[inline]
pub fn index<R: Rng + ?Sized>(rng: &mut R, len: usize) -> usize {
    rng.gen_range(0..len)
}
