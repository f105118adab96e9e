//! Normality triad: Shapiro-Wilk, Jarque-Bera, Kolmogorov-Smirnov (spec
//! §4.F). All three run against the column's reservoir sample rather than
//! the full stream — with bounded memory there is no way to re-visit every
//! value at finalize, and a uniform sample is exactly what the tests need
//! to stay honest about what they can claim.

use statrs::distribution::{ContinuousCDF, Normal};

/// Shapiro-Wilk W statistic and p-value (Royston 1995 approximation).
/// `None` outside the 3..=5000 sample-size window the test is valid for.
pub fn shapiro_wilk(sample: &[f64]) -> Option<(f64, f64)> {
    let n = sample.len();
    if !(3..=5000).contains(&n) {
        return None;
    }
    let n_f = n as f64;

    let mut y = sample.to_vec();
    y.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let normal = Normal::new(0.0, 1.0).ok()?;
    let m: Vec<f64> = (1..=n)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (n_f + 0.25)))
        .collect();
    let ssumm2: f64 = m.iter().map(|v| v * v).sum();
    if ssumm2 <= 0.0 {
        return None;
    }
    let sqrt_ssumm2 = ssumm2.sqrt();
    let rsn = 1.0 / n_f.sqrt();

    let mut a = vec![0.0; n];
    let (a_n, a_n1, tail) = if n > 5 {
        let a_n = -2.706_056 * rsn.powi(5) + 4.434_685 * rsn.powi(4) - 2.071_190 * rsn.powi(3)
            - 0.147_981 * rsn.powi(2)
            + 0.221_157 * rsn
            + m[n - 1] / sqrt_ssumm2;
        let a_n1 = -3.582_633 * rsn.powi(5) + 5.682_633 * rsn.powi(4) - 1.752_461 * rsn.powi(3)
            - 0.293_762 * rsn.powi(2)
            + 0.042_981 * rsn
            + m[n - 2] / sqrt_ssumm2;
        (a_n, a_n1, 2)
    } else {
        let a_n = m[n - 1] / sqrt_ssumm2;
        let a_n1 = if n >= 4 { m[n - 2] / sqrt_ssumm2 } else { 0.0 };
        (a_n, a_n1, 1)
    };

    let phi = if n > 5 {
        (ssumm2 - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * a_n.powi(2) - 2.0 * a_n1.powi(2))
    } else {
        (ssumm2 - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * a_n.powi(2))
    };
    if phi <= 0.0 {
        return None;
    }
    let phi_sqrt = phi.sqrt();

    for item in a.iter_mut().take(n - tail).skip(tail) {
        *item = 0.0;
    }
    for (i, item) in m.iter().enumerate().take(n - tail).skip(tail) {
        a[i] = item / phi_sqrt;
    }
    a[n - 1] = a_n;
    if n > 5 {
        a[n - 2] = a_n1;
    }
    for i in 0..tail {
        a[i] = -a[n - 1 - i];
    }

    let mean: f64 = y.iter().sum::<f64>() / n_f;
    let ss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if ss <= 0.0 {
        return None;
    }
    let num: f64 = a.iter().zip(y.iter()).map(|(ai, yi)| ai * yi).sum();
    let w = (num * num / ss).clamp(0.0, 1.0);

    let p = shapiro_wilk_pvalue(w, n_f, &normal);
    Some((w, p))
}

fn shapiro_wilk_pvalue(w: f64, n: f64, normal: &Normal) -> f64 {
    let one_minus_w = (1.0 - w).max(1e-16);
    let (z, _) = if n <= 11.0 {
        let gamma = -2.273 + 0.459 * n;
        let w1 = -((gamma - one_minus_w.ln()).max(1e-16)).ln();
        let mu = 0.544_0 - 0.399_78 * n + 0.025_054 * n * n - 0.000_671_4 * n * n * n;
        let sigma = (1.382_2 - 0.778_57 * n + 0.062_767 * n * n - 0.002_032_2 * n * n * n).exp();
        ((w1 - mu) / sigma, ())
    } else {
        let lnn = n.ln();
        let w1 = one_minus_w.ln();
        let mu = -1.5861 - 0.31082 * lnn - 0.083751 * lnn * lnn + 0.0038915 * lnn.powi(3);
        let sigma = (-0.4803 - 0.082676 * lnn + 0.0030302 * lnn * lnn).exp();
        ((w1 - mu) / sigma, ())
    };
    (1.0 - normal.cdf(z)).clamp(0.0, 1.0)
}

/// Jarque-Bera statistic and p-value from the column's full-stream skewness
/// and excess kurtosis. Closed-form chi-squared(df=2) survival function.
pub fn jarque_bera(n: u64, skewness: f64, excess_kurtosis: f64) -> (f64, f64) {
    let n_f = n as f64;
    let jb = n_f / 6.0 * (skewness * skewness + excess_kurtosis * excess_kurtosis / 4.0);
    let p = (-jb / 2.0).exp().clamp(0.0, 1.0);
    (jb, p)
}

/// One-sample Kolmogorov-Smirnov test against N(mean, std), run over the
/// reservoir sample. Returns `None` if std is zero or the sample is empty.
pub fn kolmogorov_smirnov(sample: &[f64], mean: f64, std: f64) -> Option<(f64, f64)> {
    if sample.is_empty() || std <= 0.0 {
        return None;
    }
    let normal = Normal::new(mean, std).ok()?;
    let mut y = sample.to_vec();
    y.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = y.len() as f64;

    let mut d: f64 = 0.0;
    for (i, &x) in y.iter().enumerate() {
        let f = normal.cdf(x);
        let upper = ((i as f64 + 1.0) / n - f).abs();
        let lower = (f - i as f64 / n).abs();
        d = d.max(upper).max(lower);
    }

    let lambda = (n.sqrt() + 0.12 + 0.11 / n.sqrt()) * d;
    let mut q = 0.0;
    for k in 1..=100 {
        let term = (-2.0 * (k as f64).powi(2) * lambda * lambda).exp();
        q += if k % 2 == 1 { 2.0 * term } else { -2.0 * term };
    }
    Some((d, q.clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_normal_sample(n: usize, seed: u64) -> Vec<f64> {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use rand_distr::{Distribution, Normal as RDNormal};
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = RDNormal::new(0.0, 1.0).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    #[test]
    fn shapiro_wilk_gives_high_w_for_normal_sample() {
        let sample = seeded_normal_sample(500, 1);
        let (w, _) = shapiro_wilk(&sample).unwrap();
        assert!(w > 0.95, "w={w}");
    }

    #[test]
    fn shapiro_wilk_gives_lower_w_for_skewed_sample() {
        let sample: Vec<f64> = (1..=500u64).map(|i| (i as f64).powi(3)).collect();
        let (w, _) = shapiro_wilk(&sample).unwrap();
        assert!(w < 0.9, "w={w}");
    }

    #[test]
    fn jarque_bera_near_zero_for_normal_moments() {
        let (jb, p) = jarque_bera(1000, 0.01, 0.02);
        assert!(jb < 1.0);
        assert!(p > 0.5);
    }

    #[test]
    fn ks_rejects_uniform_sample_against_normal() {
        let sample: Vec<f64> = (0..500).map(|i| i as f64 / 500.0).collect();
        let mean = sample.iter().sum::<f64>() / sample.len() as f64;
        let var = sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (sample.len() as f64 - 1.0);
        let (d, p) = kolmogorov_smirnov(&sample, mean, var.sqrt()).unwrap();
        assert!(d > 0.05);
        assert!(p < 0.1);
    }
}
