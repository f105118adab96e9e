//! Pair Estimator State (spec §3): bivariate statistics between two
//! numeric columns. Pearson is exact via the online Welford covariance
//! recurrence; Spearman needs ranks over the whole stream, which bounded
//! memory can't give us, so it is estimated from a synchronized paired
//! reservoir sample (both columns' values sampled together under the same
//! inclusion decision) and ranked at finalize.

use super::reservoir::Reservoir;
use super::welford::WelfordCovariance;

pub struct PairEstimator {
    pub col_i: usize,
    pub col_j: usize,
    covariance: WelfordCovariance,
    paired: Reservoir<(f64, f64)>,
}

impl PairEstimator {
    pub fn new(col_i: usize, col_j: usize, capacity: usize, seed: u64) -> Self {
        Self {
            col_i,
            col_j,
            covariance: WelfordCovariance::new(),
            paired: Reservoir::new(capacity, seed),
        }
    }

    pub fn update(&mut self, x: f64, y: f64) {
        self.covariance.update(x, y);
        self.paired.update((x, y));
    }

    pub fn count(&self) -> u64 {
        self.covariance.count
    }

    pub fn pearson(&self) -> Option<f64> {
        self.covariance.pearson()
    }

    /// Spearman rank correlation over the paired reservoir sample: rank
    /// both columns independently (average ranks for ties), then Pearson
    /// correlate the rank sequences.
    pub fn spearman(&self) -> Option<f64> {
        let samples = self.paired.samples();
        if samples.len() < 2 {
            return None;
        }
        let xs: Vec<f64> = samples.iter().map(|&(x, _)| x).collect();
        let ys: Vec<f64> = samples.iter().map(|&(_, y)| y).collect();
        let rx = average_ranks(&xs);
        let ry = average_ranks(&ys);

        let n = rx.len() as f64;
        let mean_rx = rx.iter().sum::<f64>() / n;
        let mean_ry = ry.iter().sum::<f64>() / n;

        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for i in 0..rx.len() {
            let dx = rx[i] - mean_rx;
            let dy = ry[i] - mean_ry;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }
        if var_x == 0.0 || var_y == 0.0 {
            None
        } else {
            Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
        }
    }
}

/// Fractional ranks (1-based, ties averaged) for a slice of values.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}

/// Selects which column-index pairs to track during streaming: every pair
/// among the columns judged candidates (typically the top-variance numeric
/// columns, capped so C(k, 2) stays under `max_pairs`), spec §3.
pub fn select_pairs(candidate_columns: &[usize], max_pairs: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (a, &i) in candidate_columns.iter().enumerate() {
        for &j in &candidate_columns[a + 1..] {
            if pairs.len() >= max_pairs {
                return pairs;
            }
            pairs.push((i, j));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_linear_pair_has_pearson_and_spearman_one() {
        let mut pair = PairEstimator::new(0, 1, 1000, 1);
        for i in 1..=200 {
            let x = i as f64;
            pair.update(x, 3.0 * x - 1.0);
        }
        assert!((pair.pearson().unwrap() - 1.0).abs() < 1e-9);
        assert!((pair.spearman().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_nonlinear_pair_has_high_spearman_lower_pearson() {
        let mut pair = PairEstimator::new(0, 1, 1000, 1);
        for i in 1..=200 {
            let x = i as f64;
            pair.update(x, x.powi(3));
        }
        let spearman = pair.spearman().unwrap();
        assert!((spearman - 1.0).abs() < 1e-9);
    }

    #[test]
    fn select_pairs_respects_cap() {
        let cols: Vec<usize> = (0..10).collect();
        let pairs = select_pairs(&cols, 5);
        assert_eq!(pairs.len(), 5);
    }

    #[test]
    fn average_ranks_handles_ties() {
        let ranks = average_ranks(&[1.0, 2.0, 2.0, 3.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }
}
