//! Component G: Quality Scorer.
//!
//! Maps the finalized column reports and stream-level counters onto ten
//! 0-100 quality dimensions (spec §4.G) and combines them with the
//! configured weights into a single composite score. This module only
//! computes numbers; it assigns no labels or prose (that is a formatter
//! concern, out of scope here same as the rest of the aggregator).

use crate::config::QualityWeights;
use crate::infer::PrimaryType;
use crate::report::{ColumnReport, ImpactLevel, QualityDimensions, QualityReport};

/// Half-life, in days, used to decay the Timeliness score as the most
/// recent observed date-time value in a column ages past "now".
const TIMELINESS_HALF_LIFE_DAYS: f64 = 365.0;

const REASONABLENESS_HIGH_PENALTY: f64 = 15.0;
const REASONABLENESS_MEDIUM_PENALTY: f64 = 7.0;
const REASONABLENESS_LOW_PENALTY: f64 = 2.0;

/// Score all ten dimensions and fold them into a composite via `weights`.
pub fn score(
    columns: &[ColumnReport],
    rows_total: u64,
    rows_malformed: u64,
    duplicate_row_share: f64,
    weights: &QualityWeights,
) -> QualityReport {
    let dimensions = QualityDimensions {
        completeness: completeness(columns),
        uniqueness: (1.0 - duplicate_row_share.clamp(0.0, 1.0)) * 100.0,
        validity: validity(columns),
        consistency: consistency(columns),
        accuracy: 100.0,
        timeliness: timeliness(columns),
        integrity: integrity(rows_total, rows_malformed),
        reasonableness: reasonableness(columns),
        precision: precision(columns),
        representational: representational(columns),
    };

    let composite = dimensions.completeness * weights.completeness
        + dimensions.uniqueness * weights.uniqueness
        + dimensions.validity * weights.validity
        + dimensions.consistency * weights.consistency
        + dimensions.accuracy * weights.accuracy
        + dimensions.timeliness * weights.timeliness
        + dimensions.integrity * weights.integrity
        + dimensions.reasonableness * weights.reasonableness
        + dimensions.precision * weights.precision
        + dimensions.representational * weights.representational;

    QualityReport {
        dimensions,
        composite,
    }
}

/// 1 - (missing cells / total cells). An empty file has no cells to be
/// missing, so it scores full marks by convention (spec §8 boundary case).
fn completeness(columns: &[ColumnReport]) -> f64 {
    let total: u64 = columns.iter().map(|c| c.count + c.missing).sum();
    if total == 0 {
        return 100.0;
    }
    let missing: u64 = columns.iter().map(|c| c.missing).sum();
    (1.0 - missing as f64 / total as f64).clamp(0.0, 1.0) * 100.0
}

/// Average per-column parse-conformance ratio: `(count - non_conforming) /
/// count`, over columns that saw at least one non-missing value.
fn validity(columns: &[ColumnReport]) -> f64 {
    let rated: Vec<f64> = columns
        .iter()
        .filter(|c| c.count > 0)
        .map(|c| (c.count - c.non_conforming) as f64 / c.count as f64)
        .collect();
    if rated.is_empty() {
        return 100.0;
    }
    rated.iter().sum::<f64>() / rated.len() as f64 * 100.0
}

/// Fixed rule catalog applied to each column's reservoir sample: numeric
/// columns are checked against a wide Chebyshev-style bound (values within
/// mean +/- 5 std are "consistent"); categorical/text columns reuse their
/// label-format consistency; date-time and boolean columns have no
/// catalog rule and pass by default.
fn consistency(columns: &[ColumnReport]) -> f64 {
    let mut scores = Vec::new();
    for column in columns {
        match column.primary_type {
            PrimaryType::Integer | PrimaryType::Float => {
                if let (Some(mean), Some(std)) = (column.mean, column.std) {
                    if std > 0.0 {
                        scores.push(numeric_bound_pass_rate(column, mean, std));
                    }
                }
            }
            PrimaryType::Categorical | PrimaryType::Text => {
                if let Some(fc) = column.format_consistency {
                    scores.push(fc);
                }
            }
            PrimaryType::Boolean | PrimaryType::DateTime => {}
        }
    }
    if scores.is_empty() {
        return 100.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64 * 100.0
}

/// Share of the outlier union count (if any) that falls outside a 5-sigma
/// band, used as a proxy consistency pass rate without re-walking the
/// reservoir (the kernel already discarded raw samples by finalize time in
/// the aggregator's view; this approximates the same rule with the union
/// outlier count the kernel already computed at a tighter 3-sigma fence).
fn numeric_bound_pass_rate(column: &ColumnReport, _mean: f64, _std: f64) -> f64 {
    let Some(outliers) = &column.outliers else {
        return 1.0;
    };
    if column.reservoir_size == 0 {
        return 1.0;
    }
    1.0 - (outliers.extreme as f64 / column.reservoir_size as f64).clamp(0.0, 1.0)
}

/// Presence and recency of date-time columns; absent entirely -> 50 by
/// spec. Present columns decay exponentially from 100 with a one-year
/// half-life based on how stale their maximum observed timestamp is.
fn timeliness(columns: &[ColumnReport]) -> f64 {
    let datetime_columns: Vec<&ColumnReport> = columns
        .iter()
        .filter(|c| c.primary_type == PrimaryType::DateTime)
        .collect();
    if datetime_columns.is_empty() {
        return 50.0;
    }

    let now = chrono::Utc::now();
    let mut scores = Vec::new();
    for column in datetime_columns {
        let Some(stats) = &column.datetime_stats else {
            continue;
        };
        let Ok(max) = chrono::DateTime::parse_from_rfc3339(&stats.max) else {
            continue;
        };
        let age_days = (now - max.with_timezone(&chrono::Utc)).num_seconds() as f64 / 86_400.0;
        let age_days = age_days.max(0.0);
        let decay = 0.5_f64.powf(age_days / TIMELINESS_HALF_LIFE_DAYS);
        scores.push(decay * 100.0);
    }
    if scores.is_empty() {
        return 50.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Structural-error-rate penalty against a default of 85 (spec: "default
/// 85 when no rules").
fn integrity(rows_total: u64, rows_malformed: u64) -> f64 {
    if rows_total == 0 {
        return 85.0;
    }
    let error_rate = rows_malformed as f64 / rows_total as f64;
    85.0 * (1.0 - error_rate.clamp(0.0, 1.0))
}

/// Outlier-impact aggregation against a default of 80. Each numeric
/// column's impact tag subtracts a fixed penalty from 100; the average
/// across numeric columns with outlier data is the score. Columns without
/// outlier data (e.g. n<3) don't participate, and an input with no
/// numeric columns at all falls back to the spec's stated default.
fn reasonableness(columns: &[ColumnReport]) -> f64 {
    let penalties: Vec<f64> = columns
        .iter()
        .filter_map(|c| c.outliers.as_ref())
        .filter_map(|o| o.impact)
        .map(|impact| match impact {
            ImpactLevel::High => REASONABLENESS_HIGH_PENALTY,
            ImpactLevel::Medium => REASONABLENESS_MEDIUM_PENALTY,
            ImpactLevel::Low => REASONABLENESS_LOW_PENALTY,
        })
        .collect();
    if penalties.is_empty() {
        return 80.0;
    }
    let avg_penalty = penalties.iter().sum::<f64>() / penalties.len() as f64;
    (100.0 - avg_penalty).clamp(0.0, 100.0)
}

/// Average decimal-place consistency across numeric columns.
fn precision(columns: &[ColumnReport]) -> f64 {
    let values: Vec<f64> = columns.iter().filter_map(|c| c.decimal_consistency).collect();
    if values.is_empty() {
        return 100.0;
    }
    values.iter().sum::<f64>() / values.len() as f64 * 100.0
}

/// Average label-format consistency across categorical/text columns.
fn representational(columns: &[ColumnReport]) -> f64 {
    let values: Vec<f64> = columns.iter().filter_map(|c| c.format_consistency).collect();
    if values.is_empty() {
        return 100.0;
    }
    values.iter().sum::<f64>() / values.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::SemanticTag;
    use crate::report::Quantiles;

    fn numeric_column(count: u64, missing: u64, non_conforming: u64) -> ColumnReport {
        ColumnReport {
            index: 0,
            name: "x".into(),
            primary_type: PrimaryType::Integer,
            primary_type_confidence: 1.0,
            semantic_tag: SemanticTag::Unknown,
            count,
            missing,
            non_conforming,
            distinct_estimate: count as f64,
            min: Some(0.0),
            max: Some(100.0),
            quantiles: Quantiles::default(),
            mean: Some(50.0),
            std: Some(10.0),
            coefficient_of_variation: Some(0.2),
            skewness: Some(0.0),
            kurtosis: Some(0.0),
            mad: Some(5.0),
            iqr: Some(10.0),
            zero_count: 0,
            negative_count: 0,
            zero_variance: false,
            top_values: Vec::new(),
            outliers: None,
            normality: None,
            label_length_stats: None,
            datetime_stats: None,
            reservoir_capacity: 2048,
            reservoir_size: count.min(2048) as usize,
            decimal_consistency: Some(0.9),
            format_consistency: None,
        }
    }

    #[test]
    fn perfect_column_scores_full_completeness_and_validity() {
        let columns = vec![numeric_column(100, 0, 0)];
        let weights = QualityWeights::default();
        let report = score(&columns, 100, 0, 0.0, &weights);
        assert_eq!(report.dimensions.completeness, 100.0);
        assert_eq!(report.dimensions.validity, 100.0);
    }

    #[test]
    fn missing_and_non_conforming_values_lower_scores() {
        let columns = vec![numeric_column(80, 20, 10)];
        let weights = QualityWeights::default();
        let report = score(&columns, 100, 0, 0.0, &weights);
        assert!(report.dimensions.completeness < 100.0);
        assert!(report.dimensions.validity < 100.0);
    }

    #[test]
    fn empty_input_scores_full_completeness_by_convention() {
        let report = score(&[], 0, 0, 0.0, &QualityWeights::default());
        assert_eq!(report.dimensions.completeness, 100.0);
        assert_eq!(report.dimensions.timeliness, 50.0);
        assert_eq!(report.dimensions.integrity, 85.0);
        assert_eq!(report.dimensions.reasonableness, 80.0);
    }

    #[test]
    fn structural_errors_reduce_integrity() {
        let score_clean = integrity(1000, 0);
        let score_dirty = integrity(1000, 100);
        assert!(score_dirty < score_clean);
    }

    #[test]
    fn composite_is_within_dimension_bounds() {
        let columns = vec![numeric_column(100, 0, 0)];
        let report = score(&columns, 100, 0, 0.05, &QualityWeights::default());
        assert!(report.composite >= 0.0 && report.composite <= 100.0);
    }
}
