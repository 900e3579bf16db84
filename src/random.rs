//! Injectable randomness for peer sampling and drop decisions
//!
//! Nothing in the crate touches a process-wide generator directly: nodes and
//! the mock network take an `Arc<dyn RandomSource>`, so a simulation seeded with
//! [`SeededRandom`] picks the same peers and drops the same packets given the
//! same sequence of calls.
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..upper`. `upper` must be non-zero.
    fn index(&self, upper: usize) -> usize;

    /// Uniform float in `[0, 1)`
    fn unit_f64(&self) -> f64;
}

/// Pick up to `count` items uniformly without replacement.
///
/// Runs a partial Fisher-Yates shuffle in place, so only the first
/// `min(count, items.len())` positions are touched: O(count), not O(len).
/// The selection is the returned prefix of `items`.
pub fn partial_shuffle<'a, T>(
    rng: &dyn RandomSource,
    items: &'a mut [T],
    count: usize,
) -> &'a [T] {
    let len = items.len();
    let take = count.min(len);
    for i in 0..take {
        let j = i + rng.index(len - i);
        items.swap(i, j);
    }
    &items[..take]
}

/// Backed by the thread-local rng; not reproducible
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper)
    }

    fn unit_f64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Deterministic source for reproducible simulations and tests
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn index(&self, upper: usize) -> usize {
        // A panic while holding this lock cannot leave the rng in a bad state
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(0..upper)
    }

    fn unit_f64(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random::<f64>()
    }
}
