use std::collections::VecDeque;
use std::sync::Mutex;

use rand::Rng;

/// Source of randomness for the scan simulator.
pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, 1)`.
    fn next_unit(&self) -> f64;

    /// Uniform integer in `[0, upper)`. Returns 0 when `upper` is 0.
    fn next_below(&self, upper: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn next_below(&self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Replays fixed sequences. Once a sequence runs dry, units repeat the
/// configured fallback and integer draws return 0.
#[derive(Debug)]
pub struct ScriptedRandom {
    units: Mutex<VecDeque<f64>>,
    integers: Mutex<VecDeque<usize>>,
    fallback_unit: f64,
}

impl Default for ScriptedRandom {
    fn default() -> Self {
        Self {
            units: Mutex::new(VecDeque::new()),
            integers: Mutex::new(VecDeque::new()),
            fallback_unit: 0.999,
        }
    }
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(self, units: impl IntoIterator<Item = f64>) -> Self {
        self.units
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(units);
        self
    }

    pub fn with_integers(self, integers: impl IntoIterator<Item = usize>) -> Self {
        self.integers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(integers);
        self
    }

    pub fn with_fallback_unit(mut self, unit: f64) -> Self {
        self.fallback_unit = unit.clamp(0.0, 0.999_999);
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&self) -> f64 {
        self.units
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(self.fallback_unit)
            .clamp(0.0, 0.999_999)
    }

    fn next_below(&self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        self.integers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .map(|value| value % upper)
            .unwrap_or(0)
    }
}
