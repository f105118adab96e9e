//! Per-column estimator state (spec §3, §4.F): routes each observed raw
//! value through the estimator bank appropriate to the column's decided
//! [`PrimaryType`], and assembles the derived statistics at finalize.

use super::heavy_hitters::HeavyHitters;
use super::hyperloglog::HyperLogLog;
use super::normality;
use super::quantile::TDigest;
use super::reservoir::Reservoir;
use super::welford::WelfordMoments;
use crate::infer::{datetime, is_boolean, PrimaryType, SemanticTag};
use crate::report::{
    ColumnReport, DateTimeGranularity, DateTimeStats, ImpactLevel, LabelLengthStats,
    NormalityTest, NormalityTriad, OutlierStats, Quantiles, TopValue,
};

const TOP_VALUES_REPORTED: usize = 10;

#[derive(Debug, Clone, Default)]
struct LabelAccumulator {
    min_len: usize,
    max_len: usize,
    sum_len: u64,
    sum_len_sq: f64,
    empty_count: u64,
    observed: u64,
}

impl LabelAccumulator {
    fn observe(&mut self, raw: &str) {
        let len = raw.chars().count();
        if self.observed == 0 {
            self.min_len = len;
            self.max_len = len;
        } else {
            self.min_len = self.min_len.min(len);
            self.max_len = self.max_len.max(len);
        }
        self.sum_len += len as u64;
        self.sum_len_sq += (len as f64) * (len as f64);
        self.observed += 1;
        if raw.is_empty() {
            self.empty_count += 1;
        }
    }

    /// 1 minus the coefficient of variation of label length, clamped to
    /// [0, 1]: labels of near-uniform length score close to 1, wildly
    /// varying lengths score close to 0. Backs the Representational
    /// quality dimension.
    fn format_consistency(&self) -> f64 {
        if self.observed == 0 {
            return 1.0;
        }
        let mean = self.sum_len as f64 / self.observed as f64;
        if mean == 0.0 {
            return 1.0;
        }
        let variance = (self.sum_len_sq / self.observed as f64) - mean * mean;
        let cv = variance.max(0.0).sqrt() / mean;
        (1.0 - cv).clamp(0.0, 1.0)
    }

    fn stats(&self) -> LabelLengthStats {
        LabelLengthStats {
            min: self.min_len,
            max: self.max_len,
            mean: if self.observed == 0 {
                0.0
            } else {
                self.sum_len as f64 / self.observed as f64
            },
            empty_count: self.empty_count,
        }
    }
}

/// Greatest common divisor of two non-negative `i64`s (Euclid's algorithm).
fn gcd_i64(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[derive(Debug, Clone, Default)]
struct DateTimeAccumulator {
    min_ts: Option<i64>,
    max_ts: Option<i64>,
    dow: [u64; 7],
    month: [u64; 12],
    hour: [u64; 24],
    last_ts_nanos: Option<i64>,
    /// Running GCD of consecutive observed-order timestamp deltas, in
    /// nanoseconds. Spec §4.F: "compute granularity as the greatest common
    /// divisor over sampled intervals."
    interval_gcd_nanos: Option<i64>,
    observed: u64,
}

impl DateTimeAccumulator {
    fn observe(&mut self, ts: chrono::DateTime<chrono::Utc>) {
        use chrono::Datelike;
        let secs = ts.timestamp();
        self.min_ts = Some(self.min_ts.map_or(secs, |m| m.min(secs)));
        self.max_ts = Some(self.max_ts.map_or(secs, |m| m.max(secs)));
        self.dow[ts.weekday().num_days_from_monday() as usize] += 1;
        self.month[(ts.month() - 1) as usize] += 1;
        self.hour[ts.hour() as usize] += 1;
        self.observed += 1;

        let ts_nanos = ts.timestamp_nanos_opt().unwrap_or_else(|| secs * 1_000_000_000);
        if let Some(last) = self.last_ts_nanos {
            let delta = (ts_nanos - last).abs();
            if delta > 0 {
                self.interval_gcd_nanos = Some(match self.interval_gcd_nanos {
                    Some(g) => gcd_i64(g, delta),
                    None => delta,
                });
            }
        }
        self.last_ts_nanos = Some(ts_nanos);
    }

    /// Buckets the running interval GCD into the coarsest unit it is an
    /// exact multiple of. Sub-day units (second/minute/hour) are fixed
    /// lengths and bucket by exact divisibility; month and year are
    /// calendar-variable, so once the GCD resolves to a whole number of
    /// days it is matched against the valid calendar-month (28-31) and
    /// calendar-year (365-366) day-count ranges instead of a fixed
    /// conversion factor. Falls back to `Day` when fewer than two distinct
    /// timestamps have been observed, or when the day-count fits neither
    /// range (e.g. weekly data).
    fn granularity(&self) -> DateTimeGranularity {
        const NS_PER_SEC: i64 = 1_000_000_000;
        const NS_PER_MIN: i64 = 60 * NS_PER_SEC;
        const NS_PER_HOUR: i64 = 60 * NS_PER_MIN;
        const NS_PER_DAY: i64 = 24 * NS_PER_HOUR;

        let gcd = match self.interval_gcd_nanos {
            Some(g) if g > 0 => g,
            _ => return DateTimeGranularity::Day,
        };
        if gcd % NS_PER_SEC != 0 {
            return DateTimeGranularity::SubSecond;
        }
        if gcd % NS_PER_MIN != 0 {
            return DateTimeGranularity::Second;
        }
        if gcd % NS_PER_HOUR != 0 {
            return DateTimeGranularity::Minute;
        }
        if gcd % NS_PER_DAY != 0 {
            return DateTimeGranularity::Hour;
        }
        match gcd / NS_PER_DAY {
            28..=31 => DateTimeGranularity::Month,
            365..=366 => DateTimeGranularity::Year,
            _ => DateTimeGranularity::Day,
        }
    }

    fn stats(&self) -> Option<DateTimeStats> {
        let (min_ts, max_ts) = (self.min_ts?, self.max_ts?);
        let fmt = |secs: i64| {
            chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0)
                .map(|d| d.to_rfc3339())
                .unwrap_or_default()
        };
        Some(DateTimeStats {
            min: fmt(min_ts),
            max: fmt(max_ts),
            granularity: self.granularity(),
            day_of_week_histogram: self.dow.to_vec(),
            month_histogram: self.month.to_vec(),
            hour_histogram: self.hour.to_vec(),
        })
    }
}

pub struct ColumnEstimator {
    primary_type: PrimaryType,
    count: u64,
    missing: u64,
    non_conforming: u64,
    zero_count: u64,
    negative_count: u64,
    moments: WelfordMoments,
    reservoir: Reservoir<f64>,
    quantiles: TDigest,
    mode_tracker: HeavyHitters<String>,
    distinct: HyperLogLog,
    label: Option<LabelAccumulator>,
    datetime: Option<DateTimeAccumulator>,
    reservoir_capacity: usize,
    /// Tally of decimal-place counts seen for numeric values, backing the
    /// Precision quality dimension's decimal-consistency measure.
    decimal_places: std::collections::HashMap<u8, u64>,
    /// First-K row indices of non-conforming values (spec §7: "surface
    /// counts and first-K examples in the Report"), capped independently of
    /// `non_conforming` so the count stays the single source of truth.
    non_conforming_examples: Vec<String>,
    non_conforming_examples_cap: usize,
}

/// Count digits after the decimal point in a trimmed numeric literal. Not
/// exponent-aware (scientific notation is rare enough in profiled data that
/// treating `1e10` as zero decimal places is an acceptable approximation).
fn decimal_places_of(raw: &str) -> u8 {
    raw.trim()
        .split('.')
        .nth(1)
        .map(|frac| frac.chars().take_while(|c| c.is_ascii_digit()).count().min(255) as u8)
        .unwrap_or(0)
}

impl ColumnEstimator {
    pub fn new(primary_type: PrimaryType) -> Self {
        let cfg = crate::config::get();
        let mode_capacity = cfg
            .heavy_hitter_min_capacity
            .max(cfg.heavy_hitter_distinct_multiplier * 8);
        Self {
            primary_type,
            count: 0,
            missing: 0,
            non_conforming: 0,
            zero_count: 0,
            negative_count: 0,
            moments: WelfordMoments::new(),
            reservoir: Reservoir::new(cfg.reservoir_capacity, cfg.reservoir_seed),
            quantiles: TDigest::new(cfg.quantile_epsilon),
            mode_tracker: HeavyHitters::new(mode_capacity),
            distinct: HyperLogLog::new(cfg.hll_precision),
            label: matches!(primary_type, PrimaryType::Categorical | PrimaryType::Text)
                .then(LabelAccumulator::default),
            datetime: matches!(primary_type, PrimaryType::DateTime)
                .then(DateTimeAccumulator::default),
            reservoir_capacity: cfg.reservoir_capacity,
            decimal_places: std::collections::HashMap::new(),
            non_conforming_examples: Vec::new(),
            non_conforming_examples_cap: cfg.diagnostic_examples_cap,
        }
    }

    fn record_non_conforming(&mut self, row_index: u64) {
        self.non_conforming += 1;
        if self.non_conforming_examples.len() < self.non_conforming_examples_cap {
            self.non_conforming_examples.push(format!("row {row_index}"));
        }
    }

    pub fn observe(&mut self, raw: &str, row_index: u64) {
        if crate::infer::is_missing_token(raw) {
            self.missing += 1;
            return;
        }
        self.count += 1;
        self.mode_tracker.update(raw.to_string());
        self.distinct.update(&raw);

        // Streaming-phase promotion (spec §9): a float value inside an
        // integer column widens the column rather than being counted as
        // non-conforming. A column never narrows back once widened.
        if self.primary_type == PrimaryType::Integer
            && !crate::infer::is_integer(raw)
            && crate::infer::is_float(raw)
        {
            self.primary_type = self.primary_type.widen(PrimaryType::Float);
        }

        match self.primary_type {
            PrimaryType::Integer | PrimaryType::Float => match raw.trim().parse::<f64>() {
                Ok(x) if x.is_finite() => {
                    if x == 0.0 {
                        self.zero_count += 1;
                    }
                    if x < 0.0 {
                        self.negative_count += 1;
                    }
                    self.moments.update(x);
                    self.reservoir.update(x);
                    self.quantiles.insert(x);
                    *self.decimal_places.entry(decimal_places_of(raw)).or_insert(0) += 1;
                }
                _ => self.record_non_conforming(row_index),
            },
            PrimaryType::Boolean => {
                if !is_boolean(raw) {
                    self.record_non_conforming(row_index);
                }
                self.label
                    .get_or_insert_with(LabelAccumulator::default)
                    .observe(raw);
            }
            PrimaryType::DateTime => match datetime::parse(raw) {
                Some(ts) => self
                    .datetime
                    .get_or_insert_with(DateTimeAccumulator::default)
                    .observe(ts),
                None => self.record_non_conforming(row_index),
            },
            PrimaryType::Categorical | PrimaryType::Text => {
                self.label
                    .get_or_insert_with(LabelAccumulator::default)
                    .observe(raw);
            }
        }
    }

    /// Assemble the finalized report row. `confidence` is the type
    /// decision's confidence from the profiling prefix.
    pub fn finalize(
        mut self,
        index: usize,
        name: String,
        confidence: f64,
        semantic_tag: SemanticTag,
    ) -> ColumnReport {
        let is_numeric = matches!(self.primary_type, PrimaryType::Integer | PrimaryType::Float);

        let quantiles = if is_numeric {
            Quantiles {
                q01: self.quantiles.quantile(0.01),
                q05: self.quantiles.quantile(0.05),
                q10: self.quantiles.quantile(0.10),
                q25: self.quantiles.quantile(0.25),
                q50: self.quantiles.quantile(0.50),
                q75: self.quantiles.quantile(0.75),
                q90: self.quantiles.quantile(0.90),
                q95: self.quantiles.quantile(0.95),
                q99: self.quantiles.quantile(0.99),
            }
        } else {
            Quantiles::default()
        };

        let mad = is_numeric
            .then(|| self.median_absolute_deviation())
            .flatten();
        let iqr = match (quantiles.q25, quantiles.q75) {
            (Some(q25), Some(q75)) => Some(q75 - q25),
            _ => None,
        };

        let outliers = is_numeric
            .then(|| self.outlier_stats(quantiles.q25, quantiles.q75, mad))
            .flatten();
        let normality = is_numeric.then(|| self.normality_triad());

        let top_values = self
            .mode_tracker
            .top(TOP_VALUES_REPORTED)
            .into_iter()
            .map(|(value, count)| TopValue { value, count })
            .collect();

        let decimal_consistency = is_numeric.then(|| self.decimal_consistency()).flatten();
        let format_consistency = self.label.as_ref().map(LabelAccumulator::format_consistency);

        ColumnReport {
            index,
            name,
            primary_type: self.primary_type,
            primary_type_confidence: confidence,
            semantic_tag,
            count: self.count,
            missing: self.missing,
            non_conforming: self.non_conforming,
            non_conforming_examples: self.non_conforming_examples,
            distinct_estimate: self.distinct.estimate(),
            min: is_numeric.then(|| self.quantiles.min()).flatten(),
            max: is_numeric.then(|| self.quantiles.max()).flatten(),
            quantiles,
            mean: is_numeric.then_some(self.moments.mean),
            std: is_numeric.then(|| self.moments.std_dev()).flatten(),
            coefficient_of_variation: is_numeric
                .then(|| self.moments.coefficient_of_variation())
                .flatten(),
            skewness: is_numeric.then(|| self.moments.skewness()).flatten(),
            kurtosis: is_numeric.then(|| self.moments.kurtosis()).flatten(),
            mad,
            iqr,
            zero_count: self.zero_count,
            negative_count: self.negative_count,
            zero_variance: is_numeric && self.moments.variance() == Some(0.0),
            top_values,
            outliers,
            normality,
            label_length_stats: self.label.as_ref().map(LabelAccumulator::stats),
            datetime_stats: self.datetime.as_ref().and_then(DateTimeAccumulator::stats),
            reservoir_capacity: self.reservoir_capacity,
            reservoir_size: self.reservoir.len(),
            decimal_consistency,
            format_consistency,
        }
    }

    /// Share of numeric observations sharing the modal decimal-place count.
    /// Backs the Precision quality dimension (spec §4.G).
    fn decimal_consistency(&self) -> Option<f64> {
        if self.decimal_places.is_empty() {
            return None;
        }
        let total: u64 = self.decimal_places.values().sum();
        let max = *self.decimal_places.values().max().unwrap_or(&0);
        Some(max as f64 / total as f64)
    }

    fn median_absolute_deviation(&mut self) -> Option<f64> {
        let median = self.quantiles.quantile(0.5)?;
        let mut deviations: Vec<f64> = self
            .reservoir
            .samples()
            .iter()
            .map(|&x| (x - median).abs())
            .collect();
        if deviations.is_empty() {
            return None;
        }
        deviations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = deviations.len() / 2;
        Some(if deviations.len() % 2 == 0 {
            (deviations[mid - 1] + deviations[mid]) / 2.0
        } else {
            deviations[mid]
        })
    }

    /// Outlier counts over the reservoir sample: IQR fences at 1.5x and
    /// 3x, a |z| > 3 standard-score fence, and a modified-z (MAD-based)
    /// fence at 3.5. A union count dedupes rows flagged by more than one
    /// method; impact is tagged against the union's share of the sample.
    fn outlier_stats(&self, q25: Option<f64>, q75: Option<f64>, mad: Option<f64>) -> Option<OutlierStats> {
        let samples = self.reservoir.samples();
        if samples.is_empty() {
            return None;
        }
        let mean = self.moments.mean;
        let std = self.moments.std_dev();
        let median = q25.zip(q75).map(|(a, b)| (a + b) / 2.0);

        let (mut iqr_low, mut iqr_high, mut extreme) = (0u64, 0u64, 0u64);
        let (mut z_low, mut z_high, mut modified_z) = (0u64, 0u64, 0u64);
        let mut union = 0u64;

        let iqr = q25.zip(q75).map(|(a, b)| b - a);

        for &x in samples {
            let mut flagged = false;
            if let (Some(q25), Some(q75), Some(iqr)) = (q25, q75, iqr) {
                if x < q25 - 1.5 * iqr {
                    iqr_low += 1;
                    flagged = true;
                } else if x > q75 + 1.5 * iqr {
                    iqr_high += 1;
                    flagged = true;
                }
                if x < q25 - 3.0 * iqr || x > q75 + 3.0 * iqr {
                    extreme += 1;
                    flagged = true;
                }
            }
            if let Some(std) = std {
                if std > 0.0 {
                    let z = (x - mean) / std;
                    if z < -3.0 {
                        z_low += 1;
                        flagged = true;
                    } else if z > 3.0 {
                        z_high += 1;
                        flagged = true;
                    }
                }
            }
            if let (Some(median), Some(mad)) = (median, mad) {
                if mad > 0.0 && (0.6745 * (x - median) / mad).abs() > 3.5 {
                    modified_z += 1;
                    flagged = true;
                }
            }
            if flagged {
                union += 1;
            }
        }

        let share = union as f64 / samples.len() as f64;
        let impact = Some(if share > 0.10 {
            ImpactLevel::High
        } else if share > 0.05 {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        });

        Some(OutlierStats {
            iqr_low,
            iqr_high,
            extreme,
            z_low,
            z_high,
            modified_z,
            union_count: union,
            impact,
        })
    }

    fn normality_triad(&self) -> NormalityTriad {
        let samples = self.reservoir.samples();
        let shapiro = samples.len().min(5000);
        let shapiro = if shapiro >= 3 {
            normality::shapiro_wilk(&samples[..shapiro])
        } else {
            None
        };
        let jb = (self.moments.skewness(), self.moments.kurtosis());
        let jarque_bera = match jb {
            (Some(s), Some(k)) => Some(normality::jarque_bera(self.count, s, k)),
            _ => None,
        };
        let ks = match self.moments.std_dev() {
            Some(std) if std > 0.0 => {
                normality::kolmogorov_smirnov(samples, self.moments.mean, std)
            }
            _ => None,
        };

        let as_test = |r: Option<(f64, f64)>| match r {
            Some((stat, p)) => NormalityTest {
                statistic: Some(stat),
                p_value: Some(p),
            },
            None => NormalityTest::default(),
        };

        NormalityTriad {
            shapiro: as_test(shapiro),
            jarque_bera: as_test(jarque_bera),
            ks: as_test(ks),
        }
    }
}
