//! Fixed-capacity reservoir sample maintained with Algorithm R (Vitter
//! 1985): uniform-without-replacement semantics over an unbounded stream
//! in O(capacity) memory.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct Reservoir<T> {
    capacity: usize,
    samples: Vec<T>,
    seen: u64,
    rng: StdRng,
}

impl<T: Clone> Reservoir<T> {
    pub fn new(capacity: usize, seed: u64) -> Self {
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            seen: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    pub fn update(&mut self, value: T) {
        self.seen += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(value);
            return;
        }
        if self.capacity == 0 {
            return;
        }
        let j = self.rng.gen_range(0..self.seen);
        if (j as usize) < self.capacity {
            self.samples[j as usize] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_capacity() {
        let mut r = Reservoir::new(16, 42);
        for i in 0..10_000u64 {
            r.update(i);
        }
        assert_eq!(r.len(), 16);
    }

    #[test]
    fn holds_all_values_when_stream_below_capacity() {
        let mut r = Reservoir::new(100, 1);
        for i in 0..10u64 {
            r.update(i);
        }
        assert_eq!(r.len(), 10);
    }

    #[test]
    fn deterministic_given_fixed_seed() {
        let run = |seed| {
            let mut r = Reservoir::new(8, seed);
            for i in 0..1000u64 {
                r.update(i);
            }
            r.samples().to_vec()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn inclusion_is_not_obviously_biased() {
        // Coarse check: across many small streams, the first element
        // survives into the final reservoir roughly capacity/n of the
        // time, not always or never.
        let trials = 2000;
        let n = 50u64;
        let capacity = 5;
        let mut survived = 0;
        for seed in 0..trials {
            let mut r = Reservoir::new(capacity, seed);
            for i in 0..n {
                r.update(i);
            }
            if r.samples().contains(&0) {
                survived += 1;
            }
        }
        let rate = survived as f64 / trials as f64;
        let expected = capacity as f64 / n as f64;
        assert!((rate - expected).abs() < 0.05, "rate={rate} expected={expected}");
    }
}
