//! Component E: Type Inferencer.
//!
//! Operates on the bounded profiling prefix (spec §4.E): for each column,
//! tallies how many non-missing values match each candidate type, then
//! assigns the most specific type for which >= 95% parse, with fixed
//! precedence on ties. Also derives a semantic tag from the column name
//! and observed value statistics.

pub mod datetime;

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Primary data type assigned to a column after profiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryType {
    Integer,
    Boolean,
    Float,
    DateTime,
    Categorical,
    Text,
}

impl PrimaryType {
    /// Precedence used when multiple candidate types clear the 95%
    /// threshold: integer > boolean > float > date-time > categorical > text.
    fn precedence(self) -> u8 {
        match self {
            PrimaryType::Integer => 0,
            PrimaryType::Boolean => 1,
            PrimaryType::Float => 2,
            PrimaryType::DateTime => 3,
            PrimaryType::Categorical => 4,
            PrimaryType::Text => 5,
        }
    }

    /// Type promotion lattice (spec §9): integer -> float -> text;
    /// boolean/date-time/categorical collapse to text on conflict. A
    /// column never narrows back once widened. Applied by
    /// `kernel::column::ColumnEstimator::observe` during the streaming
    /// phase, when a later value widens the type `decide_type` picked from
    /// the profiling prefix (currently: integer columns that meet a float).
    pub fn widen(self, evidence: PrimaryType) -> PrimaryType {
        use PrimaryType::*;
        match (self, evidence) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            (Text, _) | (_, Text) => Text,
            _ => Text,
        }
    }
}

/// Semantic tag derived from column name and value statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticTag {
    Identifier,
    Age,
    Status,
    Category,
    Unknown,
}

const BOOLEAN_TOKENS: [&str; 10] = [
    "true", "false", "yes", "no", "y", "n", "0", "1", "t", "f",
];

const MISSING_TOKENS: [&str; 6] = ["", "null", "undefined", "na", "n/a", "nan"];

pub fn is_missing_token(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    MISSING_TOKENS.contains(&v.as_str())
}

fn integer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+$").unwrap())
}

fn float_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+)([eE][+-]?\d+)?$").unwrap())
}

fn id_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(id|uuid|key)\b|_id$|^id").unwrap())
}

fn age_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bage\b").unwrap())
}

pub fn is_integer(value: &str) -> bool {
    let v = value.trim();
    integer_regex().is_match(v) && v.parse::<i64>().is_ok()
}

pub fn is_float(value: &str) -> bool {
    let v = value.trim();
    float_regex().is_match(v) && v.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

pub fn is_boolean(value: &str) -> bool {
    BOOLEAN_TOKENS.contains(&value.trim().to_ascii_lowercase().as_str())
}

/// Per-column tallies accumulated during the profiling prefix.
#[derive(Debug, Default, Clone)]
pub struct ColumnProfile {
    pub name: String,
    pub non_missing: usize,
    pub missing: usize,
    integer_count: usize,
    float_count: usize,
    boolean_count: usize,
    datetime_count: usize,
    distinct: std::collections::HashSet<String>,
    max_label_len: usize,
    numeric_in_age_range: usize,
}

impl ColumnProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn observe(&mut self, raw: &str) {
        if is_missing_token(raw) {
            self.missing += 1;
            return;
        }
        self.non_missing += 1;
        self.max_label_len = self.max_label_len.max(raw.chars().count());
        self.distinct.insert(raw.to_string());

        if is_integer(raw) {
            self.integer_count += 1;
            if let Ok(n) = raw.trim().parse::<i64>() {
                if (0..=120).contains(&n) {
                    self.numeric_in_age_range += 1;
                }
            }
        }
        if is_float(raw) {
            self.float_count += 1;
        }
        if is_boolean(raw) {
            self.boolean_count += 1;
        }
        if datetime::matches(raw) {
            self.datetime_count += 1;
        }
    }

    fn ratio(&self, count: usize) -> f64 {
        if self.non_missing == 0 {
            0.0
        } else {
            count as f64 / self.non_missing as f64
        }
    }

    fn distinct_ratio(&self) -> f64 {
        if self.non_missing == 0 {
            0.0
        } else {
            self.distinct.len() as f64 / self.non_missing as f64
        }
    }

    /// Decide the primary type: the most specific type clearing the 95%
    /// threshold, else the lowest-precedence fallback between
    /// categorical and text based on distinct ratio / label length.
    pub fn decide_type(&self, threshold: f64) -> (PrimaryType, f64) {
        if self.non_missing == 0 {
            return (PrimaryType::Text, 0.0);
        }

        let mut candidates: Vec<(PrimaryType, f64)> = vec![
            (PrimaryType::Integer, self.ratio(self.integer_count)),
            (PrimaryType::Boolean, self.ratio(self.boolean_count)),
            (PrimaryType::Float, self.ratio(self.float_count)),
            (PrimaryType::DateTime, self.ratio(self.datetime_count)),
        ];
        candidates.retain(|&(_, ratio)| ratio >= threshold);
        candidates.sort_by_key(|&(ty, _)| ty.precedence());

        if let Some(&(ty, ratio)) = candidates.first() {
            return (ty, ratio);
        }

        if self.distinct_ratio() <= crate::config::defaults::CATEGORICAL_DISTINCT_RATIO
            && self.max_label_len <= crate::config::defaults::CATEGORICAL_MAX_LABEL_LEN
        {
            (PrimaryType::Categorical, 1.0 - self.distinct_ratio())
        } else {
            (PrimaryType::Text, 1.0)
        }
    }

    /// Derive a semantic tag from the column name and observed stats.
    pub fn decide_semantic_tag(&self, primary: PrimaryType) -> SemanticTag {
        let distinct_ratio = self.distinct_ratio();

        if id_name_regex().is_match(&self.name) && distinct_ratio > 0.9 {
            return SemanticTag::Identifier;
        }
        if age_name_regex().is_match(&self.name)
            && primary == PrimaryType::Integer
            && self.non_missing > 0
            && self.numeric_in_age_range as f64 / self.non_missing as f64 > 0.9
        {
            return SemanticTag::Age;
        }
        if primary == PrimaryType::Categorical && self.distinct.len() == 2 {
            return SemanticTag::Status;
        }
        if primary == PrimaryType::Categorical {
            return SemanticTag::Category;
        }
        SemanticTag::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_column_decides_integer_with_full_confidence() {
        let mut p = ColumnProfile::new("amount");
        for v in ["1", "2", "3", "-4", "5"] {
            p.observe(v);
        }
        let (ty, conf) = p.decide_type(0.95);
        assert_eq!(ty, PrimaryType::Integer);
        assert_eq!(conf, 1.0);
    }

    #[test]
    fn mixed_integer_and_float_decides_float() {
        let mut p = ColumnProfile::new("amount");
        for v in ["1", "2.5", "3", "4.75", "5"] {
            p.observe(v);
        }
        let (ty, _) = p.decide_type(0.95);
        assert_eq!(ty, PrimaryType::Float);
    }

    #[test]
    fn low_cardinality_strings_classify_categorical() {
        let mut p = ColumnProfile::new("status");
        for _ in 0..50 {
            p.observe("active");
        }
        for _ in 0..50 {
            p.observe("inactive");
        }
        let (ty, _) = p.decide_type(0.95);
        assert_eq!(ty, PrimaryType::Categorical);
        assert_eq!(p.decide_semantic_tag(ty), SemanticTag::Status);
    }

    #[test]
    fn high_cardinality_strings_classify_text() {
        let mut p = ColumnProfile::new("comments");
        for i in 0..100 {
            p.observe(&format!("unique comment number {i}"));
        }
        let (ty, _) = p.decide_type(0.95);
        assert_eq!(ty, PrimaryType::Text);
    }

    #[test]
    fn id_column_gets_identifier_tag() {
        let mut p = ColumnProfile::new("user_id");
        for i in 0..100 {
            p.observe(&i.to_string());
        }
        let (ty, _) = p.decide_type(0.95);
        assert_eq!(p.decide_semantic_tag(ty), SemanticTag::Identifier);
    }

    #[test]
    fn all_missing_column_decides_text_unknown() {
        let mut p = ColumnProfile::new("mystery");
        for _ in 0..10 {
            p.observe("");
        }
        let (ty, conf) = p.decide_type(0.95);
        assert_eq!(ty, PrimaryType::Text);
        assert_eq!(conf, 0.0);
        assert_eq!(p.decide_semantic_tag(ty), SemanticTag::Unknown);
    }

    #[test]
    fn widen_never_narrows() {
        assert_eq!(PrimaryType::Integer.widen(PrimaryType::Float), PrimaryType::Float);
        assert_eq!(PrimaryType::Float.widen(PrimaryType::Text), PrimaryType::Text);
        assert_eq!(PrimaryType::Boolean.widen(PrimaryType::Text), PrimaryType::Text);
    }
}
