//! Quality-dimension weights (spec §4.G).

use serde::{Deserialize, Serialize};

/// Weights applied to each of the ten quality dimensions before summing
/// into the composite score. Defaults match spec §4.G exactly and
/// normalize to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityWeights {
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

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.15,
            uniqueness: 0.10,
            validity: 0.12,
            consistency: 0.10,
            accuracy: 0.08,
            timeliness: 0.07,
            integrity: 0.10,
            reasonableness: 0.08,
            precision: 0.10,
            representational: 0.10,
        }
    }
}

impl QualityWeights {
    /// Sum of all weights. Should be ~1.0 for the defaults; validated at
    /// config load time but not re-enforced at scoring time (an operator
    /// who overrides weights to not sum to 1 gets a composite that isn't
    /// a clean 0-100 scale, which is their call).
    pub fn sum(&self) -> f64 {
        self.completeness
            + self.uniqueness
            + self.validity
            + self.consistency
            + self.accuracy
            + self.timeliness
            + self.integrity
            + self.reasonableness
            + self.precision
            + self.representational
    }
}
