//! Injectable randomness for finders and the mutation loop.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of random decisions.
///
/// Only the mutation loop and the finders draw from it; cloning, analyses and replay
/// never do.
pub trait RandomSource {
    /// Uniform value in `0..bound`. `bound` must be non-zero.
    fn next_below(&mut self, bound: u64) -> u64;

    fn next_bool(&mut self) -> bool {
        self.next_below(2) == 1
    }

    /// Uniform value in `min..=max`
    fn range_inclusive(&mut self, min: u32, max: u32) -> u32 {
        debug_assert!(min <= max);
        min + self.next_below(u64::from(max - min) + 1) as u32
    }

    /// True with `percent` percent probability
    fn chance(&mut self, percent: u32) -> bool {
        self.next_below(100) < u64::from(percent)
    }

    fn pick_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot pick from an empty collection");
        self.next_below(len as u64) as usize
    }
}

/// Pick a uniformly random element
pub fn pick<'a, T>(rng: &mut dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    Some(&items[rng.pick_index(items.len())])
}

/// Seeded ChaCha8 generator
pub struct ChaChaSource {
    rng: ChaCha8Rng,
}

impl ChaChaSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for ChaChaSource {
    fn next_below(&mut self, bound: u64) -> u64 {
        self.rng.gen_range(0..bound)
    }
}
