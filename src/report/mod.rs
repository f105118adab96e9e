//! Component H: Result Aggregator — the immutable `Report` data model
//! consumed by external formatters (spec §6). Field names here are the
//! contract; this module only assembles data, it does not render it.

pub mod multivariate;

use serde::Serialize;

use crate::encoding::Encoding;
use crate::infer::{PrimaryType, SemanticTag};

#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub byte_count: u64,
    pub encoding: String,
    pub encoding_confidence: f64,
    pub bom_present: bool,
    pub replacement_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DialectInfo {
    pub delimiter: String,
    pub quote: Option<String>,
    pub line_terminator: String,
    pub header_present: bool,
    pub confidence: f64,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureInfo {
    pub rows_total: u64,
    pub rows_malformed: u64,
    pub columns: usize,
    pub header: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Quantiles {
    pub q01: Option<f64>,
    pub q05: Option<f64>,
    pub q10: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub q90: Option<f64>,
    pub q95: Option<f64>,
    pub q99: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct OutlierStats {
    pub iqr_low: u64,
    pub iqr_high: u64,
    pub extreme: u64,
    pub z_low: u64,
    pub z_high: u64,
    pub modified_z: u64,
    pub union_count: u64,
    pub impact: Option<ImpactLevel>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct NormalityTest {
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct NormalityTriad {
    pub shapiro: NormalityTest,
    pub jarque_bera: NormalityTest,
    pub ks: NormalityTest,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelLengthStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub empty_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeGranularity {
    SubSecond,
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateTimeStats {
    pub min: String,
    pub max: String,
    pub granularity: DateTimeGranularity,
    pub day_of_week_histogram: Vec<u64>,
    pub month_histogram: Vec<u64>,
    pub hour_histogram: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopValue {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
    pub index: usize,
    pub name: String,
    pub primary_type: PrimaryType,
    pub primary_type_confidence: f64,
    pub semantic_tag: SemanticTag,
    pub count: u64,
    pub missing: u64,
    pub non_conforming: u64,
    pub non_conforming_examples: Vec<String>,
    pub distinct_estimate: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub quantiles: Quantiles,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub coefficient_of_variation: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub mad: Option<f64>,
    pub iqr: Option<f64>,
    pub zero_count: u64,
    pub negative_count: u64,
    pub zero_variance: bool,
    pub top_values: Vec<TopValue>,
    pub outliers: Option<OutlierStats>,
    pub normality: Option<NormalityTriad>,
    pub label_length_stats: Option<LabelLengthStats>,
    pub datetime_stats: Option<DateTimeStats>,
    pub reservoir_capacity: usize,
    pub reservoir_size: usize,
    /// Share of numeric values sharing the column's dominant decimal-place
    /// count. Backs the Precision quality dimension.
    pub decimal_consistency: Option<f64>,
    /// 1 - CV of label length for categorical/text columns. Backs the
    /// Representational quality dimension.
    pub format_consistency: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub i: usize,
    pub j: usize,
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    pub n: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PcaReport {
    pub explained_variance: Vec<f64>,
    pub loadings: Vec<Vec<f64>>,
    pub columns: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub k: usize,
    pub centers: Vec<Vec<f64>>,
    pub sizes: Vec<usize>,
    pub silhouette: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MultivariateReport {
    pub pca: Option<PcaReport>,
    pub clusters: Option<ClusterReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityDimensions {
    pub completeness: f64,
    pub uniqueness: f64,
    pub validity: f64,
    pub consistency: f64,
    pub accuracy: f64,
    pub timeliness: f64,
    pub integrity: f64,
    pub reasonableness: f64,
    pub precision: f64,
    pub representational: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub dimensions: QualityDimensions,
    pub composite: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DiagnosticCounter {
    pub count: u64,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Diagnostics {
    pub aborted: bool,
    pub fatal_error: Option<String>,
    pub byte_offset: Option<u64>,
    pub structural_errors: DiagnosticCounter,
    pub unterminated_quotes: DiagnosticCounter,
    pub parse_non_conformance: std::collections::BTreeMap<String, DiagnosticCounter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub source: SourceInfo,
    pub dialect: DialectInfo,
    pub structure: StructureInfo,
    pub columns: Vec<ColumnReport>,
    pub pairs: Vec<PairReport>,
    pub multivariate: MultivariateReport,
    pub quality: QualityReport,
    pub diagnostics: Diagnostics,
}

impl Encoding {
    pub fn tag(self) -> &'static str {
        self.as_str()
    }
}
