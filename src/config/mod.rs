//! Pipeline configuration.
//!
//! Provides process-wide tunables loaded from a TOML file, replacing all
//! hardcoded estimator parameters with operator-tunable values, the same
//! shape the rest of this lineage uses for its own runtime configuration.
//!
//! ## Loading order
//!
//! 1. A path passed explicitly to [`PipelineConfig::load`] (e.g. from `--config`).
//! 2. The `TABLESCAN_CONFIG` environment variable.
//! 3. `tablescan.toml` in the current working directory.
//! 4. Built-in defaults ([`PipelineConfig::default`]).
//!
//! ## Usage
//!
//! ```ignore
//! config::init(PipelineConfig::load(None));
//! let r = config::get().reservoir_capacity;
//! ```

pub mod defaults;
mod weights;

pub use weights::QualityWeights;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Errors that can occur while loading or validating a [`PipelineConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunable parameters for every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Size of the profiling prefix (rows) on which column types are decided.
    pub n_profile: usize,
    /// Reservoir sample capacity per column (Algorithm R), R.
    pub reservoir_capacity: usize,
    /// Target rank error for the quantile sketch, epsilon.
    pub quantile_epsilon: f64,
    /// Floor for the heavy-hitter (mode tracker) table capacity.
    pub heavy_hitter_min_capacity: usize,
    /// Multiplier applied to expected-distinct to size the heavy-hitter table.
    pub heavy_hitter_distinct_multiplier: usize,
    /// HyperLogLog precision (register-count exponent).
    pub hll_precision: u8,
    /// Number of highest-variance numeric columns considered for full
    /// pairwise bivariate statistics.
    pub max_pair_columns: usize,
    /// Hard cap on tracked pair estimators.
    pub max_pairs_cap: usize,
    /// Dialect-detection byte budget.
    pub dialect_budget_bytes: usize,
    /// Dialect-detection line budget.
    pub dialect_budget_lines: usize,
    /// Byte source chunk size floor.
    pub chunk_size_bytes: usize,
    /// Fixed seed for reservoir sampling, for reproducible reports.
    pub reservoir_seed: u64,
    /// Max example row indices retained per diagnostic counter.
    pub diagnostic_examples_cap: usize,
    /// Per-dimension quality weights.
    pub quality_weights: QualityWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_profile: defaults::N_PROFILE,
            reservoir_capacity: defaults::RESERVOIR_CAPACITY,
            quantile_epsilon: defaults::QUANTILE_EPSILON,
            heavy_hitter_min_capacity: defaults::HEAVY_HITTER_MIN_CAPACITY,
            heavy_hitter_distinct_multiplier: defaults::HEAVY_HITTER_DISTINCT_MULTIPLIER,
            hll_precision: defaults::HLL_PRECISION,
            max_pair_columns: defaults::MAX_PAIR_COLUMNS,
            max_pairs_cap: defaults::MAX_PAIRS_CAP,
            dialect_budget_bytes: defaults::DIALECT_BUDGET_BYTES,
            dialect_budget_lines: defaults::DIALECT_BUDGET_LINES,
            chunk_size_bytes: defaults::CHUNK_SIZE_BYTES,
            reservoir_seed: defaults::DEFAULT_RESERVOIR_SEED,
            diagnostic_examples_cap: defaults::DIAGNOSTIC_EXAMPLES_CAP,
            quality_weights: QualityWeights::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolve and load configuration following the documented load order.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("TABLESCAN_CONFIG").map(PathBuf::from))
            .or_else(|| {
                let cwd = PathBuf::from("tablescan.toml");
                cwd.exists().then_some(cwd)
            });

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check the loaded configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_profile == 0 || self.n_profile > 1000 {
            return Err(ConfigError::Invalid(format!(
                "n_profile must be in 1..=1000, got {}",
                self.n_profile
            )));
        }
        if self.reservoir_capacity == 0 {
            return Err(ConfigError::Invalid(
                "reservoir_capacity must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.quantile_epsilon) {
            return Err(ConfigError::Invalid(
                "quantile_epsilon must be in (0, 1)".into(),
            ));
        }
        if self.max_pair_columns == 0 {
            return Err(ConfigError::Invalid("max_pair_columns must be > 0".into()));
        }
        Ok(())
    }
}

/// Global pipeline configuration, initialized once at startup.
static PIPELINE_CONFIG: OnceLock<PipelineConfig> = OnceLock::new();

/// Initialize the global pipeline configuration. Safe to call more than
/// once (subsequent calls are ignored with a warning) so tests that each
/// construct a `Pipeline` don't need to coordinate a single init point.
pub fn init(config: PipelineConfig) {
    if PIPELINE_CONFIG.set(config).is_err() {
        tracing::debug!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global pipeline configuration, falling back to
/// defaults if `init()` was never called (e.g. library use without a CLI).
pub fn get() -> &'static PipelineConfig {
    PIPELINE_CONFIG.get_or_init(PipelineConfig::default)
}

pub fn is_initialized() -> bool {
    PIPELINE_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_n_profile() {
        let mut cfg = PipelineConfig::default();
        cfg.n_profile = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_without_any_path_falls_back_to_defaults() {
        // Only valid if TABLESCAN_CONFIG is unset and no tablescan.toml
        // exists in the test runner's cwd, which holds in CI.
        if std::env::var_os("TABLESCAN_CONFIG").is_none() && !Path::new("tablescan.toml").exists()
        {
            let cfg = PipelineConfig::load(None).unwrap();
            assert_eq!(cfg, PipelineConfig::default());
        }
    }
}
