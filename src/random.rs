//! Process-wide seeded random number generation.
//!
//! Random-number generation is the only process-wide state of the engine.
//! The generator is re-seeded from `stepper.random_seed` at engine
//! construction and on any reset that requests it, which makes two runs with
//! the same seed and options bit-identical.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

static GENERATOR: Mutex<Option<StdRng>> = Mutex::new(None);

/// Re-seed the process-wide generator.
pub fn reset_rand_generators(seed: u32) {
    if let Ok(mut guard) = GENERATOR.lock() {
        *guard = Some(StdRng::seed_from_u64(u64::from(seed)));
    }
}

/// Uniform sample in `[lo, hi)`. Returns `lo` for an empty range.
#[must_use]
pub fn rand_uniform(lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    match GENERATOR.lock() {
        Ok(mut guard) => {
            let rng = guard.get_or_insert_with(|| StdRng::seed_from_u64(0));
            rng.gen_range(lo..hi)
        }
        Err(_) => lo,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reseeding_reproduces_the_sequence() {
        reset_rand_generators(42);
        let a: Vec<f64> = (0..5).map(|_| rand_uniform(-1.0, 1.0)).collect();
        reset_rand_generators(42);
        let b: Vec<f64> = (0..5).map(|_| rand_uniform(-1.0, 1.0)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn samples_stay_in_range() {
        reset_rand_generators(7);
        for _ in 0..100 {
            let s = rand_uniform(2.0, 3.0);
            assert!((2.0..3.0).contains(&s));
        }
    }
}
