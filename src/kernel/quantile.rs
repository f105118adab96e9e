//! Rank-error-bounded quantile sketch (a simplified merging t-digest,
//! Dunning 2019) used for the per-column quantile estimates (spec §3,
//! §4.F). Bounded memory regardless of stream length; reported rank
//! error tightens as `compression` grows.

#[derive(Debug, Clone, Copy)]
struct Centroid {
    mean: f64,
    weight: f64,
}

#[derive(Debug, Clone)]
pub struct TDigest {
    compression: f64,
    centroids: Vec<Centroid>,
    buffer: Vec<f64>,
    total_weight: f64,
    min: f64,
    max: f64,
    flush_threshold: usize,
}

impl TDigest {
    /// `epsilon` is the target rank error; compression scales inversely
    /// with it (smaller epsilon -> more centroids retained).
    pub fn new(epsilon: f64) -> Self {
        let epsilon = epsilon.clamp(1e-6, 0.5);
        let compression = (1.0 / epsilon).clamp(20.0, 1000.0);
        Self {
            compression,
            centroids: Vec::new(),
            buffer: Vec::with_capacity(512),
            total_weight: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            flush_threshold: 512,
        }
    }

    pub fn insert(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        self.min = self.min.min(x);
        self.max = self.max.max(x);
        self.buffer.push(x);
        if self.buffer.len() >= self.flush_threshold {
            self.compress();
        }
    }

    /// Merge buffered raw points into the centroid list, re-clustering
    /// under the k-size scale function so the digest stays bounded.
    pub fn compress(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut points: Vec<Centroid> = self
            .buffer
            .drain(..)
            .map(|x| Centroid { mean: x, weight: 1.0 })
            .collect();
        points.extend(self.centroids.drain(..));
        points.sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap_or(std::cmp::Ordering::Equal));

        let total: f64 = points.iter().map(|c| c.weight).sum();
        if total == 0.0 {
            return;
        }

        let mut merged: Vec<Centroid> = Vec::with_capacity(points.len());
        let mut cum_before = 0.0;
        let mut current = points[0];

        for next in points.into_iter().skip(1) {
            let cum_after = cum_before + current.weight + next.weight;
            let q0 = cum_before / total;
            let q2 = cum_after / total;
            let limit = self.k_size_limit(q0, q2) * total;

            if current.weight + next.weight <= limit {
                let w = current.weight + next.weight;
                current.mean = (current.mean * current.weight + next.mean * next.weight) / w;
                current.weight = w;
            } else {
                cum_before += current.weight;
                merged.push(current);
                current = next;
            }
        }
        merged.push(current);

        self.centroids = merged;
        self.total_weight = total;
    }

    /// k-size scale function bounding how much relative mass a single
    /// centroid may absorb as a function of where it sits in the
    /// distribution (tighter near the tails, looser in the middle).
    fn k_size_limit(&self, q0: f64, q1: f64) -> f64 {
        let k = |q: f64| (q * (1.0 - q)).sqrt();
        (4.0 / self.compression) * k((q0 + q1) / 2.0).max(1e-9)
    }

    /// Estimate the value at rank `q` in [0, 1]. Forces a final
    /// compression pass if raw points are still buffered.
    pub fn quantile(&mut self, q: f64) -> Option<f64> {
        self.compress();
        if self.centroids.is_empty() {
            return None;
        }
        if self.centroids.len() == 1 {
            return Some(self.centroids[0].mean);
        }
        let q = q.clamp(0.0, 1.0);
        let target = q * self.total_weight;

        let mut cum = 0.0;
        for (i, c) in self.centroids.iter().enumerate() {
            let next_cum = cum + c.weight;
            if target <= next_cum || i == self.centroids.len() - 1 {
                if i == 0 {
                    return Some(self.min.min(c.mean));
                }
                let prev = self.centroids[i - 1];
                let frac = if c.weight > 0.0 {
                    ((target - cum) / c.weight).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                return Some(prev.mean + frac * (c.mean - prev.mean));
            }
            cum = next_cum;
        }
        Some(self.max)
    }

    pub fn min(&self) -> Option<f64> {
        if self.min.is_finite() { Some(self.min) } else { None }
    }

    pub fn max(&self) -> Option<f64> {
        if self.max.is_finite() { Some(self.max) } else { None }
    }

    pub fn count(&self) -> f64 {
        self.total_weight + self.buffer.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_uniform_sample_is_near_true_median() {
        let mut td = TDigest::new(0.01);
        for i in 1..=100_000u64 {
            td.insert(i as f64);
        }
        let median = td.quantile(0.5).unwrap();
        assert!((median - 50_000.0).abs() < 1000.0, "median={median}");
    }

    #[test]
    fn extremes_match_min_max() {
        let mut td = TDigest::new(0.01);
        for i in 1..=10_000u64 {
            td.insert(i as f64);
        }
        assert!((td.quantile(0.0).unwrap() - 1.0).abs() < 5.0);
        assert!((td.quantile(1.0).unwrap() - 10_000.0).abs() < 5.0);
    }

    #[test]
    fn single_value_returns_that_value_for_any_quantile() {
        let mut td = TDigest::new(0.01);
        td.insert(42.0);
        assert_eq!(td.quantile(0.1), Some(42.0));
        assert_eq!(td.quantile(0.9), Some(42.0));
    }

    #[test]
    fn empty_digest_returns_none() {
        let mut td = TDigest::new(0.01);
        assert_eq!(td.quantile(0.5), None);
    }
}
