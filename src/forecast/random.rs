//! Randomness used to synthesize forecasts.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Source of uniformly distributed integers, shared across requests.
pub trait RandomSource: Send + Sync {
    /// A value in the half-open range `[low, high)`.
    fn next_in_range(&self, low: i32, high: i32) -> i32;
}

/// Thread-local `rand` generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_in_range(&self, low: i32, high: i32) -> i32 {
        rand::thread_rng().gen_range(low..high)
    }
}

/// Deterministic source replaying a fixed sequence.
///
/// Each value is clamped into the requested range, and the sequence wraps
/// around when exhausted.
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<i32>,
    position: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(values: Vec<i32>) -> Self {
        Self {
            values,
            position: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_in_range(&self, low: i32, high: i32) -> i32 {
        if self.values.is_empty() {
            return low;
        }
        let index = self.position.fetch_add(1, Ordering::Relaxed) % self.values.len();
        self.values[index].clamp(low, high - 1)
    }
}
