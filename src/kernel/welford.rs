//! Welford's numerically stable one-pass recurrence for running mean and
//! central moments M2/M3/M4, used to derive variance, skewness, and
//! excess kurtosis without a second pass over the data.

#[derive(Debug, Clone, Copy, Default)]
pub struct WelfordMoments {
    pub count: u64,
    pub mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
}

impl WelfordMoments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, x: f64) {
        let n1 = self.count as f64;
        self.count += 1;
        let n = self.count as f64;
        let delta = x - self.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * n1;

        self.mean += delta_n;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0)
            + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
    }

    pub fn variance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.m2 / (self.count as f64 - 1.0))
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn coefficient_of_variation(&self) -> Option<f64> {
        let std = self.std_dev()?;
        if self.mean == 0.0 {
            None
        } else {
            Some(std / self.mean)
        }
    }

    /// Bias-corrected sample skewness. `None` below n=3 (spec §4.F edge
    /// case policy).
    pub fn skewness(&self) -> Option<f64> {
        if self.count < 3 {
            return None;
        }
        let n = self.count as f64;
        if self.m2 == 0.0 {
            return Some(0.0);
        }
        let g1 = (n.sqrt() * self.m3) / self.m2.powf(1.5);
        Some((n * (n - 1.0)).sqrt() / (n - 2.0) * g1)
    }

    /// Excess kurtosis (kurtosis - 3). `None` below n=4 (needs at least
    /// one more observation than skewness to be well-defined).
    pub fn kurtosis(&self) -> Option<f64> {
        if self.count < 4 {
            return None;
        }
        let n = self.count as f64;
        if self.m2 == 0.0 {
            return Some(0.0);
        }
        let g2 = (n * self.m4) / (self.m2 * self.m2) - 3.0;
        let correction = (n - 1.0) / ((n - 2.0) * (n - 3.0));
        Some(correction * ((n + 1.0) * g2 + 6.0))
    }

    pub fn m2(&self) -> f64 {
        self.m2
    }
}

/// Online Pearson-correlation accumulator for a pair of numeric columns,
/// built from the same recurrence (spec §3's Pair Estimator State).
#[derive(Debug, Clone, Copy, Default)]
pub struct WelfordCovariance {
    pub count: u64,
    mean_x: f64,
    mean_y: f64,
    c: f64, // running sum of (x - mean_x)(y - mean_y_prev)
    mx: WelfordMoments,
    my: WelfordMoments,
}

impl WelfordCovariance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, x: f64, y: f64) {
        self.count += 1;
        let n = self.count as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        let dy = y - self.mean_y;
        self.mean_y += dy / n;
        self.c += dx * (y - self.mean_y);
        self.mx.update(x);
        self.my.update(y);
    }

    pub fn covariance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.c / (self.count as f64 - 1.0))
        }
    }

    pub fn pearson(&self) -> Option<f64> {
        let cov = self.covariance()?;
        let sx = self.mx.std_dev()?;
        let sy = self.my.std_dev()?;
        if sx == 0.0 || sy == 0.0 {
            None
        } else {
            Some((cov / (sx * sy)).clamp(-1.0, 1.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_variance_match_known_values() {
        let mut w = WelfordMoments::new();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            w.update(x);
        }
        assert!((w.mean - 5.0).abs() < 1e-9);
        assert!((w.variance().unwrap() - 4.571428571428571).abs() < 1e-9);
    }

    #[test]
    fn below_minimum_n_moments_are_none() {
        let mut w = WelfordMoments::new();
        w.update(1.0);
        w.update(2.0);
        assert!(w.skewness().is_none());
        assert!(w.kurtosis().is_none());
        assert!(w.variance().is_some());
    }

    #[test]
    fn perfectly_correlated_pair_gives_pearson_one() {
        let mut cov = WelfordCovariance::new();
        for i in 1..=100 {
            let x = i as f64;
            cov.update(x, 2.0 * x + 1.0);
        }
        assert!((cov.pearson().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn constant_column_has_no_variance_ratio() {
        let mut w = WelfordMoments::new();
        for _ in 0..10 {
            w.update(3.0);
        }
        assert_eq!(w.variance().unwrap(), 0.0);
        assert!(w.coefficient_of_variation().is_some());
    }
}
