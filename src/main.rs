//! `tablescan` CLI: thin argument wiring over the [`tablescan::Pipeline`]
//! library. Per the output contract, this binary owns no algorithmic depth —
//! it resolves input, runs the pipeline, and serializes (a view of) the
//! resulting `Report` to stdout or `--output`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tablescan::config::{self, PipelineConfig};
use tablescan::encoding::Encoding;
use tablescan::report::Report;
use tablescan::source::ByteSource;
use tablescan::{Pipeline, PipelineOverrides};
use tracing::{info, warn};

/// Sub-report selection, per the documented CLI contract. Each variant
/// narrows which top-level fields of the `Report` are emitted; it selects
/// no additional analysis beyond what the pipeline always computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
enum ReportSection {
    Overview,
    Quality,
    Eda,
    Viz,
    Engineering,
    Modeling,
    All,
}

impl ReportSection {
    fn fields(self) -> &'static [&'static str] {
        match self {
            ReportSection::Overview => &["source", "dialect", "structure", "diagnostics"],
            ReportSection::Quality => &["quality"],
            ReportSection::Eda => &["columns", "pairs", "multivariate"],
            // viz/engineering/modeling rule engines are out of scope for
            // this core; these sections surface the closest data the
            // pipeline already computes rather than an empty object.
            ReportSection::Viz => &["columns", "multivariate"],
            ReportSection::Engineering => &["columns", "quality"],
            ReportSection::Modeling => &["multivariate", "quality"],
            ReportSection::All => &[
                "source",
                "dialect",
                "structure",
                "columns",
                "pairs",
                "multivariate",
                "quality",
                "diagnostics",
            ],
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tablescan")]
#[command(about = "Streaming, bounded-memory data-profiling engine for delimited tabular files")]
#[command(version)]
struct CliArgs {
    /// Path to the input file. Omit to read from stdin.
    path: Option<PathBuf>,

    /// Sub-report sections to include in the output (may be repeated).
    #[arg(long = "section", value_enum, default_value = "all")]
    sections: Vec<ReportSection>,

    /// Write the report to this path instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Wall-clock budget in seconds; on expiry the stream is cancelled and
    /// a partial report (`diagnostics.aborted = true`) is returned.
    #[arg(long)]
    timeout: Option<u64>,

    /// Force the encoding instead of letting the resolver sniff it.
    #[arg(long, value_enum)]
    encoding: Option<CliEncoding>,

    /// Force the field delimiter instead of letting the detector pick one.
    #[arg(long)]
    delimiter: Option<char>,

    /// Path to a TOML configuration file (see `TABLESCAN_CONFIG`).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum CliEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Latin1,
}

impl From<CliEncoding> for Encoding {
    fn from(value: CliEncoding) -> Self {
        match value {
            CliEncoding::Utf8 => Encoding::Utf8,
            CliEncoding::Utf16Le => Encoding::Utf16Le,
            CliEncoding::Utf16Be => Encoding::Utf16Be,
            CliEncoding::Utf32Le => Encoding::Utf32Le,
            CliEncoding::Utf32Be => Encoding::Utf32Be,
            CliEncoding::Latin1 => Encoding::Latin1,
        }
    }
}

/// Keep only the requested top-level sections of the serialized report.
fn select_sections(report: &Report, sections: &[ReportSection]) -> Result<serde_json::Value> {
    let full = serde_json::to_value(report).context("failed to serialize report")?;
    let serde_json::Value::Object(map) = full else {
        unreachable!("Report always serializes to a JSON object")
    };

    let wanted: std::collections::HashSet<&str> =
        sections.iter().flat_map(|s| s.fields().iter().copied()).collect();

    let filtered: serde_json::Map<String, serde_json::Value> = map
        .into_iter()
        .filter(|(key, _)| wanted.contains(key.as_str()))
        .collect();
    Ok(serde_json::Value::Object(filtered))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let cfg = PipelineConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    config::init(cfg.clone());

    let overrides = PipelineOverrides {
        encoding: args.encoding.map(Encoding::from),
        delimiter: args.delimiter,
    };

    let pipeline = match &args.path {
        Some(path) => {
            info!(path = %path.display(), "profiling file");
            let source = ByteSource::from_path(path, cfg.chunk_size_bytes)
                .context("failed to open input file")?;
            Pipeline::new(source, overrides)
        }
        None => {
            info!("profiling stdin");
            let source = ByteSource::from_stdin(cfg.chunk_size_bytes);
            Pipeline::new(source, overrides)
        }
    };

    if let Some(secs) = args.timeout {
        let token = pipeline.cancellation_token();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            token.cancel();
        });
    }

    let report = pipeline.run()?;

    if report.diagnostics.aborted {
        warn!(
            byte_offset = ?report.diagnostics.byte_offset,
            "stream aborted before completion; returning partial report"
        );
    }

    let sections = if args.sections.is_empty() {
        vec![ReportSection::All]
    } else {
        args.sections.clone()
    };
    let output = select_sections(&report, &sections)?;
    let rendered = serde_json::to_string_pretty(&output).context("failed to render report")?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
