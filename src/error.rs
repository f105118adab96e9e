//! Crate-wide error type.
//!
//! Per the kernel's failure semantics, almost nothing in the pipeline is
//! fatal: parse failures, unterminated quotes, structural mismatches, and
//! uninferrable encodings are all counted as diagnostics on the `Report`
//! rather than surfaced as `Err`. The only fatal condition is an I/O read
//! failure, which aborts the stream and produces a partial report.

use thiserror::Error;

use crate::source::SourceError;

/// Top-level error type for the `tablescan` pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("fatal I/O error: {0}")]
    Io(#[from] SourceError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
