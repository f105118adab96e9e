//! System-wide default constants.
//!
//! Centralises the magic numbers spec'd out for the kernel's estimator
//! banks so they aren't scattered across `kernel/*`. Grouped by subsystem.

// ============================================================================
// Type inference
// ============================================================================

/// Size of the profiling prefix on which column types and the descriptor
/// set are finalized. Never exceeds 1000 per the data-model invariants.
pub const N_PROFILE: usize = 1000;

/// Fraction of non-missing values in the profiling window that must parse
/// under a candidate type for it to be selected.
pub const TYPE_DECISION_THRESHOLD: f64 = 0.95;

/// Distinct-ratio ceiling (over the profiling prefix) below which a
/// string column is classified categorical rather than text.
pub const CATEGORICAL_DISTINCT_RATIO: f64 = 0.1;

/// Max label length (bytes) for categorical classification.
pub const CATEGORICAL_MAX_LABEL_LEN: usize = 64;

// ============================================================================
// Reservoir / sketches
// ============================================================================

/// Reservoir sample capacity (Algorithm R), per column.
pub const RESERVOIR_CAPACITY: usize = 2048;

/// Target rank error for the quantile sketch.
pub const QUANTILE_EPSILON: f64 = 0.01;

/// Minimum heavy-hitter table capacity (mode tracker / duplicate-row
/// tracker), used as a floor when 32x expected-distinct would be smaller.
pub const HEAVY_HITTER_MIN_CAPACITY: usize = 256;

/// Multiplier applied to an expected-distinct estimate to size the
/// heavy-hitter table (Misra-Gries / SpaceSaving), per spec §3.
pub const HEAVY_HITTER_DISTINCT_MULTIPLIER: usize = 32;

/// HyperLogLog register-count exponent (2^p registers). p=12 -> 4096
/// registers, ~1.6% standard error, the closest standard precision to
/// spec's "approx 1%" target.
pub const HLL_PRECISION: u8 = 12;

// ============================================================================
// Bivariate pair selection
// ============================================================================

/// Number of highest-variance numerical columns (k) considered for full
/// pairwise bivariate statistics at finalize.
pub const MAX_PAIR_COLUMNS: usize = 5;

/// Hard cap on the number of pair estimators tracked during streaming,
/// covering all pairs up to 64 numerical columns: C(64, 2) = 2016.
pub const MAX_PAIRS_CAP: usize = 2016;

// ============================================================================
// Dialect detection
// ============================================================================

/// Dialect-detection byte budget (1 MiB).
pub const DIALECT_BUDGET_BYTES: usize = 1024 * 1024;

/// Dialect-detection line budget.
pub const DIALECT_BUDGET_LINES: usize = 1000;

/// Coefficient-of-variation ceiling above which a candidate delimiter is
/// considered unstable.
pub const DIALECT_CV_CEILING: f64 = 0.5;

// ============================================================================
// Byte source
// ============================================================================

/// Minimum chunk size read from the byte source.
pub const CHUNK_SIZE_BYTES: usize = 64 * 1024;

/// Bytes examined by the encoding resolver's byte-class histogram when no
/// BOM is present.
pub const ENCODING_SNIFF_BYTES: usize = 64 * 1024;

// ============================================================================
// Diagnostics
// ============================================================================

/// Max number of example row indices retained per diagnostic counter.
pub const DIAGNOSTIC_EXAMPLES_CAP: usize = 5;

// ============================================================================
// Reproducibility
// ============================================================================

/// Default fixed seed for reservoir sampling and other randomized
/// estimators, chosen for reproducible reports across runs.
pub const DEFAULT_RESERVOIR_SEED: u64 = 0x5341_4952_454E_0001;
