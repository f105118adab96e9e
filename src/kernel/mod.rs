//! Component F: Statistical Kernel.
//!
//! Owns every column's and column-pair's online estimator state and the
//! row-level duplicate detector, and assembles the finalized per-column and
//! per-pair reports. Everything in this module runs in a single streaming
//! pass with O(columns * estimator-size) memory, independent of row count.

pub mod column;
pub mod heavy_hitters;
pub mod hyperloglog;
pub mod normality;
pub mod pair;
pub mod quantile;
pub mod reservoir;
pub mod welford;

use std::hash::{Hash, Hasher};

use column::ColumnEstimator;
use heavy_hitters::HeavyHitters;
use hyperloglog::HyperLogLog;
use pair::PairEstimator;
use reservoir::Reservoir;

use crate::infer::{PrimaryType, SemanticTag};
use crate::report::{ColumnReport, PairReport};

/// Column descriptor decided during the profiling phase, carried forward
/// unchanged through the streaming phase (spec §4.E/§4.F boundary).
#[derive(Debug, Clone)]
pub struct ColumnDecision {
    pub name: String,
    pub primary_type: PrimaryType,
    pub confidence: f64,
    pub semantic_tag: SemanticTag,
}

impl ColumnDecision {
    fn is_numeric(&self) -> bool {
        matches!(self.primary_type, PrimaryType::Integer | PrimaryType::Float)
    }
}

/// Duplicate-row detector backing the Uniqueness quality dimension (spec
/// §9): a HyperLogLog for the distinct-row estimate plus a bounded
/// heavy-hitter table surfacing the most-repeated rows as diagnostics.
struct RowDedup {
    distinct: HyperLogLog,
    repeats: HeavyHitters<u64>,
    rows_seen: u64,
}

impl RowDedup {
    fn new(precision: u8, capacity: usize) -> Self {
        Self {
            distinct: HyperLogLog::new(precision),
            repeats: HeavyHitters::new(capacity),
            rows_seen: 0,
        }
    }

    fn observe(&mut self, fields: &[std::borrow::Cow<'_, str>]) {
        let mut hasher = ahash::AHasher::default();
        for field in fields {
            field.as_ref().hash(&mut hasher);
            0u8.hash(&mut hasher); // field separator, avoids "a","bc" == "ab","c" collisions
        }
        let hash = hasher.finish();
        self.distinct.update_hash(hash);
        self.repeats.update(hash);
        self.rows_seen += 1;
    }

    fn distinct_estimate(&self) -> f64 {
        self.distinct.estimate()
    }
}

/// Inputs to the Result Aggregator's multivariate stage (PCA + clustering):
/// the column indices chosen as the top-variance numeric subset, their
/// pairwise statistics, and a reservoir of jointly-sampled points over
/// exactly those columns (spec §4.F: "Cluster-analysis inputs = the
/// reservoir-sampled points over the top-variance numerical columns").
pub struct MultivariateInputs {
    pub columns: Vec<usize>,
    pub points: Vec<Vec<f64>>,
}

/// The streaming-phase owner of every per-column and per-pair estimator.
/// Constructed once the profiling phase has decided each column's type
/// (spec §5's Profiling -> Streaming transition).
pub struct StatisticalKernel {
    decisions: Vec<ColumnDecision>,
    columns: Vec<ColumnEstimator>,
    /// Every numeric-column pair up to the configured cap, tracked for the
    /// whole stream regardless of which columns eventually rank in the
    /// top-variance subset (spec §4.F: "updated during the stream for *all*
    /// numerical column pairs up to the configured cap").
    pairs: Vec<PairEstimator>,
    numeric_columns: Vec<usize>,
    /// Joint reservoir over every numeric column's value for a row (`None`
    /// where that column didn't parse), so the multivariate stage can pull
    /// a synchronized sample for whichever columns end up top-variance
    /// without needing to know that ranking while the stream is live.
    joint_reservoir: Reservoir<Vec<Option<f64>>>,
    dedup: RowDedup,
    rows_processed: u64,
    max_report_columns: usize,
}

impl StatisticalKernel {
    /// `tracked_pairs` should cover every numeric-column pair up to the
    /// configured cap (see [`pair::select_pairs`]); `max_report_columns` is
    /// the top-variance column count (k) used at finalize to downselect
    /// which pairs and cluster points are actually reported.
    pub fn new(
        decisions: Vec<ColumnDecision>,
        tracked_pairs: &[(usize, usize)],
        max_report_columns: usize,
    ) -> Self {
        let cfg = crate::config::get();
        let columns = decisions
            .iter()
            .map(|d| ColumnEstimator::new(d.primary_type))
            .collect();
        let pairs = tracked_pairs
            .iter()
            .map(|&(i, j)| PairEstimator::new(i, j, cfg.reservoir_capacity, cfg.reservoir_seed))
            .collect();
        let numeric_columns: Vec<usize> = decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_numeric())
            .map(|(i, _)| i)
            .collect();
        Self {
            decisions,
            columns,
            pairs,
            numeric_columns,
            joint_reservoir: Reservoir::new(cfg.reservoir_capacity, cfg.reservoir_seed ^ 0xC1A5_1234),
            dedup: RowDedup::new(cfg.hll_precision, cfg.heavy_hitter_min_capacity),
            rows_processed: 0,
            max_report_columns,
        }
    }

    /// Feed one tokenized, field-aligned row through every column
    /// estimator, every tracked pair, and the row-level dedup detector.
    /// `fields[i]` is `None` for a short row (fewer fields than the
    /// decided column count); treated as missing for that column.
    pub fn observe_row(&mut self, fields: &[std::borrow::Cow<'_, str>], row_index: u64) {
        self.rows_processed += 1;
        for (i, column) in self.columns.iter_mut().enumerate() {
            let raw = fields.get(i).map(|c| c.as_ref()).unwrap_or("");
            column.observe(raw, row_index);
        }
        for pair in &mut self.pairs {
            let x = fields.get(pair.col_i).and_then(|c| c.trim().parse::<f64>().ok());
            let y = fields.get(pair.col_j).and_then(|c| c.trim().parse::<f64>().ok());
            if let (Some(x), Some(y)) = (x, y) {
                pair.update(x, y);
            }
        }
        if !self.numeric_columns.is_empty() {
            let row: Vec<Option<f64>> = self
                .numeric_columns
                .iter()
                .map(|&i| fields.get(i).and_then(|c| c.trim().parse::<f64>().ok()))
                .collect();
            self.joint_reservoir.update(row);
        }
        self.dedup.observe(fields);
    }

    pub fn rows_processed(&self) -> u64 {
        self.rows_processed
    }

    pub fn distinct_row_estimate(&self) -> f64 {
        self.dedup.distinct_estimate()
    }

    pub fn duplicate_row_share(&self) -> f64 {
        if self.rows_processed == 0 {
            return 0.0;
        }
        let distinct = self.dedup.distinct_estimate().min(self.rows_processed as f64);
        1.0 - distinct / self.rows_processed as f64
    }

    pub fn finalize(self) -> (Vec<ColumnReport>, Vec<PairReport>, MultivariateInputs) {
        let numeric_columns = self.numeric_columns.clone();
        let max_report_columns = self.max_report_columns;
        let joint_reservoir = self.joint_reservoir;
        let pairs_tracked = self.pairs;

        let columns: Vec<ColumnReport> = self
            .columns
            .into_iter()
            .zip(self.decisions.into_iter())
            .enumerate()
            .map(|(index, (estimator, decision))| {
                estimator.finalize(index, decision.name, decision.confidence, decision.semantic_tag)
            })
            .collect();

        // Rank numeric columns by variance descending (ties by column
        // index, spec §4.F pair-selection policy), keep the top k with a
        // defined variance.
        let mut ranked: Vec<(usize, f64)> = numeric_columns
            .iter()
            .filter_map(|&i| {
                let report = &columns[i];
                let variance = report.std.map(|s| s * s)?;
                Some((i, variance))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        let pair_columns: Vec<usize> = ranked.into_iter().take(max_report_columns).map(|(i, _)| i).collect();
        let pair_column_set: std::collections::HashSet<usize> = pair_columns.iter().copied().collect();

        let pairs: Vec<PairReport> = pairs_tracked
            .into_iter()
            .filter(|p| pair_column_set.contains(&p.col_i) && pair_column_set.contains(&p.col_j))
            .map(|pair| PairReport {
                i: pair.col_i,
                j: pair.col_j,
                n: pair.count(),
                pearson: pair.pearson(),
                spearman: pair.spearman(),
            })
            .collect();

        // Pull out just the chosen columns' dimensions from the joint
        // reservoir, dropping rows where any chosen column didn't parse.
        let positions: Vec<usize> = pair_columns
            .iter()
            .filter_map(|&col| numeric_columns.iter().position(|&n| n == col))
            .collect();
        let points: Vec<Vec<f64>> = joint_reservoir
            .samples()
            .iter()
            .filter_map(|row| {
                positions
                    .iter()
                    .map(|&p| row[p])
                    .collect::<Option<Vec<f64>>>()
            })
            .collect();

        (
            columns,
            pairs,
            MultivariateInputs {
                columns: pair_columns,
                points,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decisions(types: &[PrimaryType]) -> Vec<ColumnDecision> {
        types
            .iter()
            .enumerate()
            .map(|(i, &t)| ColumnDecision {
                name: format!("col{i}"),
                primary_type: t,
                confidence: 1.0,
                semantic_tag: SemanticTag::Unknown,
            })
            .collect()
    }

    #[test]
    fn observes_rows_and_finalizes_column_reports() {
        let decs = decisions(&[PrimaryType::Integer, PrimaryType::Text]);
        let mut kernel = StatisticalKernel::new(decs, &[], 5);
        for i in 0..100 {
            kernel.observe_row(
                &[
                    std::borrow::Cow::Owned(i.to_string()),
                    std::borrow::Cow::Borrowed("hello"),
                ],
                i,
            );
        }
        assert_eq!(kernel.rows_processed(), 100);
        let (columns, _pairs, _mv) = kernel.finalize();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].count, 100);
    }

    #[test]
    fn duplicate_rows_reduce_distinct_estimate() {
        let decs = decisions(&[PrimaryType::Integer]);
        let mut kernel = StatisticalKernel::new(decs, &[], 5);
        for i in 0..500 {
            kernel.observe_row(&[std::borrow::Cow::Borrowed("1")], i);
        }
        let share = kernel.duplicate_row_share();
        assert!(share > 0.9, "share={share}");
    }

    #[test]
    fn tracked_pairs_report_correlation() {
        let decs = decisions(&[PrimaryType::Integer, PrimaryType::Integer]);
        let mut kernel = StatisticalKernel::new(decs, &[(0, 1)], 5);
        for i in 1..=200 {
            kernel.observe_row(
                &[
                    std::borrow::Cow::Owned(i.to_string()),
                    std::borrow::Cow::Owned((2 * i).to_string()),
                ],
                i,
            );
        }
        let (_columns, pairs, mv) = kernel.finalize();
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].pearson.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(mv.columns.len(), 2);
        assert_eq!(mv.points.len(), 200);
    }

    #[test]
    fn pair_report_downselects_to_top_variance_columns() {
        // Three numeric columns; column 2 has far higher variance than 0/1,
        // so with max_report_columns=2 only pairs touching column 2 and the
        // next-highest-variance column should survive.
        let decs = decisions(&[PrimaryType::Integer, PrimaryType::Integer, PrimaryType::Integer]);
        let tracked = pair::select_pairs(&[0, 1, 2], 10);
        let mut kernel = StatisticalKernel::new(decs, &tracked, 2);
        for i in 1..=200 {
            kernel.observe_row(
                &[
                    std::borrow::Cow::Owned((i % 3).to_string()), // near-constant
                    std::borrow::Cow::Owned((i % 5).to_string()), // low variance
                    std::borrow::Cow::Owned((i * 1000).to_string()), // high variance
                ],
                i,
            );
        }
        let (_columns, pairs, mv) = kernel.finalize();
        assert!(mv.columns.contains(&2));
        assert!(pairs.iter().all(|p| p.i == 2 || p.j == 2));
    }
}
