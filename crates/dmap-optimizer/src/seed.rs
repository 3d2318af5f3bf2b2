//! Per-partition seed derivation.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed for partition `index` of a run with base seed `base`.
///
/// SplitMix64 output for the `index + 1`-th state after `base`. Every step is a
/// bijection on `u64`, so distinct indices always give distinct seeds.
pub fn derive_seed(base: u64, index: usize) -> u64 {
    let offset = (index as u64).wrapping_add(1).wrapping_mul(GOLDEN_GAMMA);
    mix64(base.wrapping_add(offset))
}

/// Base seed for the run following a run seeded with `base`.
pub fn advance_seed(base: u64) -> u64 {
    ChaCha8Rng::seed_from_u64(base).next_u64()
}

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
