//! Injectable entropy for measurement sampling.
//!
//! Measurement collapses a superposition by weighted-random choice, and the
//! randomness must come through an explicit source rather than ambient
//! global state: production uses the thread RNG, reproducible games use a
//! seeded generator, and tests script exact outcomes.

use std::collections::VecDeque;

use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

/// A source of uniform samples in `[0, 1)` used to pick the winning branch
/// of a measurement.
pub trait EntropySource {
    fn next_unit(&mut self) -> f64;
}

/// Production entropy: the thread-local RNG.
#[derive(Default)]
pub struct ThreadEntropy {
    rng: ThreadRng,
}

impl ThreadEntropy {
    pub fn new() -> Self {
        ThreadEntropy { rng: rand::rng() }
    }
}

impl EntropySource for ThreadEntropy {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Seeded entropy for reproducible games and benchmarks.
pub struct SeededEntropy {
    rng: StdRng,
}

impl SeededEntropy {
    pub fn from_seed(seed: u64) -> Self {
        SeededEntropy {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl EntropySource for SeededEntropy {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Scripted entropy for tests: yields the queued values in order, then
/// repeats the last one (so a test scripting one measurement is not broken
/// by an engine that legitimately measures again).
pub struct ScriptedEntropy {
    values: VecDeque<f64>,
    last: f64,
}

impl ScriptedEntropy {
    pub fn new(values: &[f64]) -> Self {
        ScriptedEntropy {
            values: values.iter().copied().collect(),
            last: values.last().copied().unwrap_or(0.0),
        }
    }
}

impl EntropySource for ScriptedEntropy {
    fn next_unit(&mut self) -> f64 {
        match self.values.pop_front() {
            Some(value) => {
                self.last = value;
                value
            }
            None => self.last,
        }
    }
}
