//! Pipeline orchestration: wires Components A through H into the single
//! synchronous, single-threaded pass described in spec §5. `Pipeline` owns
//! every piece of state for one run, constructor-injected, the same shape
//! the teacher's `PipelineCoordinator` takes for one packet stream.

use std::io::Read;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dialect::{self, ParseContext};
use crate::encoding::{self, Decoder, Encoding};
use crate::error::Error;
use crate::infer::{ColumnProfile, PrimaryType};
use crate::kernel::{pair, ColumnDecision, MultivariateInputs, StatisticalKernel};
use crate::quality;
use crate::report::multivariate;
use crate::report::{
    DialectInfo, Diagnostics, DiagnosticCounter, MultivariateReport, PairReport, Report,
    SourceInfo, StructureInfo,
};
use crate::source::{ByteSource, CancellationToken, Chunk, SourceError};
use crate::tokenizer::{RawRecord, Tokenizer};

/// Overrides the CLI is allowed to force onto dialect/encoding detection
/// (spec §6: `--encoding`, `--delimiter`).
#[derive(Debug, Clone, Default)]
pub struct PipelineOverrides {
    pub encoding: Option<Encoding>,
    pub delimiter: Option<char>,
}

enum Stage {
    Profiling {
        profiles: Vec<ColumnProfile>,
        /// Rows seen during profiling, buffered so they can be replayed
        /// into the kernel once types are decided (spec §4.F: "records
        /// buffered in a bounded queue and forwarded once types are
        /// decided"). Carries each row's original index so replayed rows
        /// keep their real position for diagnostic examples.
        buffered_rows: Vec<(u64, Vec<String>)>,
    },
    Streaming {
        kernel: StatisticalKernel,
    },
}

struct DiagnosticAccumulator {
    count: u64,
    examples: Vec<String>,
    cap: usize,
}

impl DiagnosticAccumulator {
    fn new(cap: usize) -> Self {
        Self {
            count: 0,
            examples: Vec::new(),
            cap,
        }
    }

    fn record(&mut self, example: impl Into<String>) {
        self.count += 1;
        if self.examples.len() < self.cap {
            self.examples.push(example.into());
        }
    }

    fn into_counter(self) -> DiagnosticCounter {
        DiagnosticCounter {
            count: self.count,
            examples: self.examples,
        }
    }
}

/// Owns all per-run mutable state the tokenizer callback needs. Kept
/// separate from the tokenizer itself so the callback closure can borrow
/// this mutably without also needing to hold the tokenizer borrow.
struct IngestState {
    cfg: PipelineConfig,
    ctx_has_header: bool,
    header: Option<Vec<String>>,
    column_count: Option<usize>,
    rows_total: u64,
    rows_malformed: u64,
    structural_errors: DiagnosticAccumulator,
    unterminated_quotes: DiagnosticAccumulator,
    stage: Stage,
}

impl IngestState {
    fn new(cfg: PipelineConfig, has_header: bool) -> Self {
        let examples_cap = cfg.diagnostic_examples_cap;
        Self {
            ctx_has_header: has_header,
            header: None,
            column_count: None,
            rows_total: 0,
            rows_malformed: 0,
            structural_errors: DiagnosticAccumulator::new(examples_cap),
            unterminated_quotes: DiagnosticAccumulator::new(examples_cap),
            stage: Stage::Profiling {
                profiles: Vec::new(),
                buffered_rows: Vec::new(),
            },
            cfg,
        }
    }

    fn handle_record(&mut self, record: RawRecord) {
        if record.unterminated_quote {
            self.unterminated_quotes.record(format!("row {}", record.row_index));
        }

        let fields: Vec<String> = record.fields().map(|c| c.into_owned()).collect();

        if self.header.is_none() && self.ctx_has_header {
            self.header = Some(synthesize_header(&fields));
            self.column_count = Some(fields.len());
            return;
        }

        let column_count = *self.column_count.get_or_insert_with(|| fields.len());
        if self.header.is_none() {
            self.header = Some((0..column_count).map(|i| format!("Col_{i}")).collect());
        }

        self.rows_total += 1;
        if fields.len() != column_count {
            self.rows_malformed += 1;
            self.structural_errors.record(format!("row {}", record.row_index));
            return;
        }

        let header = &self.header;
        match &mut self.stage {
            Stage::Profiling { profiles, buffered_rows } => {
                if profiles.is_empty() {
                    *profiles = (0..column_count)
                        .map(|i| {
                            let name = header
                                .as_ref()
                                .and_then(|h| h.get(i))
                                .cloned()
                                .unwrap_or_else(|| format!("Col_{i}"));
                            ColumnProfile::new(name)
                        })
                        .collect();
                }
                for (i, value) in fields.iter().enumerate() {
                    profiles[i].observe(value);
                }
                buffered_rows.push((record.row_index, fields));

                if buffered_rows.len() >= self.cfg.n_profile {
                    self.promote_to_streaming();
                }
            }
            Stage::Streaming { kernel } => {
                let cows: Vec<std::borrow::Cow<str>> =
                    fields.into_iter().map(std::borrow::Cow::Owned).collect();
                kernel.observe_row(&cows, record.row_index);
            }
        }
    }

    /// Decide column types from the profiling prefix and transition into
    /// the streaming phase, replaying every buffered row into the kernel.
    fn promote_to_streaming(&mut self) {
        let Stage::Profiling { profiles, buffered_rows } = std::mem::replace(
            &mut self.stage,
            Stage::Streaming {
                kernel: StatisticalKernel::new(Vec::new(), &[], self.cfg.max_pair_columns),
            },
        ) else {
            unreachable!()
        };

        let header = self.header.clone().unwrap_or_default();
        let decisions: Vec<ColumnDecision> = profiles
            .iter()
            .enumerate()
            .map(|(i, profile)| {
                let (primary_type, confidence) =
                    profile.decide_type(crate::config::defaults::TYPE_DECISION_THRESHOLD);
                let semantic_tag = profile.decide_semantic_tag(primary_type);
                let name = header.get(i).cloned().unwrap_or_else(|| format!("Col_{i}"));
                ColumnDecision {
                    name,
                    primary_type,
                    confidence,
                    semantic_tag,
                }
            })
            .collect();

        debug!(columns = decisions.len(), rows_profiled = buffered_rows.len(), "type inference complete");

        let numeric_columns: Vec<usize> = decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| matches!(d.primary_type, PrimaryType::Integer | PrimaryType::Float))
            .map(|(i, _)| i)
            .collect();
        let tracked_pairs = pair::select_pairs(&numeric_columns, self.cfg.max_pairs_cap);

        let mut kernel = StatisticalKernel::new(decisions, &tracked_pairs, self.cfg.max_pair_columns);
        for (row_index, row) in buffered_rows {
            let cows: Vec<std::borrow::Cow<str>> = row.into_iter().map(std::borrow::Cow::Owned).collect();
            kernel.observe_row(&cows, row_index);
        }

        self.stage = Stage::Streaming { kernel };
        info!("entering streaming phase");
    }

    fn column_names(&self) -> Vec<String> {
        self.header.clone().unwrap_or_default()
    }

    /// Consume the accumulated state and build the final report. `source`
    /// carries the byte/encoding/dialect metadata gathered up front.
    fn finalize(mut self, source: SourceInfo, dialect: DialectInfo, aborted: bool, fatal_error: Option<String>, byte_offset: Option<u64>) -> Report {
        if matches!(self.stage, Stage::Profiling { .. }) {
            // Stream ended (or aborted) before the profiling prefix filled;
            // decide types from whatever was observed.
            if let Stage::Profiling { profiles, .. } = &self.stage {
                if !profiles.is_empty() {
                    self.promote_to_streaming();
                }
            }
        }

        let (columns, pairs, multivariate_inputs) = match self.stage {
            Stage::Streaming { kernel } => {
                let rows_processed = kernel.rows_processed();
                let duplicate_row_share = kernel.duplicate_row_share();
                let (columns, pairs, mv) = kernel.finalize();
                (columns, pairs, Some((mv, rows_processed, duplicate_row_share)))
            }
            Stage::Profiling { .. } => (Vec::new(), Vec::new(), None),
        };

        let (pairs, mv_report, duplicate_row_share) = match multivariate_inputs {
            Some((mv, _rows, dup_share)) => (pairs, build_multivariate_report(&mv), dup_share),
            None => (Vec::<PairReport>::new(), MultivariateReport::default(), 0.0),
        };

        let quality = quality::score(
            &columns,
            self.rows_total,
            self.rows_malformed,
            duplicate_row_share,
            &self.cfg.quality_weights,
        );

        let parse_non_conformance = columns
            .iter()
            .filter(|c| c.non_conforming > 0)
            .map(|c| {
                (
                    c.name.clone(),
                    DiagnosticCounter {
                        count: c.non_conforming,
                        examples: c.non_conforming_examples.clone(),
                    },
                )
            })
            .collect();

        Report {
            source,
            dialect,
            structure: StructureInfo {
                rows_total: self.rows_total,
                rows_malformed: self.rows_malformed,
                columns: columns.len(),
                header: self.column_names(),
            },
            columns,
            pairs,
            multivariate: mv_report,
            quality,
            diagnostics: Diagnostics {
                aborted,
                fatal_error,
                byte_offset,
                structural_errors: self.structural_errors.into_counter(),
                unterminated_quotes: self.unterminated_quotes.into_counter(),
                parse_non_conformance,
            },
        }
    }
}

fn synthesize_header(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                format!("Col_{i}")
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

fn build_multivariate_report(inputs: &MultivariateInputs) -> MultivariateReport {
    MultivariateReport {
        pca: multivariate::compute_pca(&inputs.points, &inputs.columns),
        clusters: multivariate::compute_clusters(&inputs.points, crate::config::get().reservoir_seed),
    }
}

/// The assembled, constructor-injected pipeline for one profiling run.
pub struct Pipeline<R: Read> {
    source: ByteSource<R>,
    overrides: PipelineOverrides,
}

impl<R: Read> Pipeline<R> {
    pub fn new(source: ByteSource<R>, overrides: PipelineOverrides) -> Self {
        Self { source, overrides }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.source.cancellation_token()
    }

    /// Run the pipeline to completion (or to cancellation/I/O failure) and
    /// produce the finalized report. Only a fatal I/O error returns `Err`;
    /// every other anomaly becomes a diagnostic on the returned `Report`.
    pub fn run(mut self) -> Result<Report, Error> {
        let cfg = crate::config::get().clone();

        let first_chunk = match self.source.next_chunk() {
            Ok(Chunk::Data(bytes)) => bytes,
            Ok(Chunk::End) => {
                let mut report = empty_report(&cfg);
                if self.source.cancellation_token().is_cancelled() {
                    report.diagnostics.aborted = true;
                    report.diagnostics.byte_offset = Some(self.source.total_bytes());
                }
                return Ok(report);
            }
            Err(source_err) => return Err(source_err.into()),
        };

        let decision = self
            .overrides
            .encoding
            .map(|enc| encoding::EncodingDecision {
                encoding: enc,
                confidence: 1.0,
                bom_present: false,
                bom_len: 0,
            })
            .unwrap_or_else(|| encoding::detect(&first_chunk));

        info!(encoding = decision.encoding.as_str(), confidence = decision.confidence, "encoding resolved");

        let mut decoder = Decoder::new(decision.encoding);
        let mut prefix = String::new();
        prefix.push_str(&decode_to_string(&mut decoder, &first_chunk[decision.bom_len..]));

        let mut aborted = false;
        let mut fatal_error: Option<String> = None;
        let mut byte_offset: Option<u64> = None;

        // Accumulate additional chunks until the dialect-detection budget
        // (bytes or lines) is satisfied, or the stream ends.
        loop {
            if self.source.total_bytes() as usize >= cfg.dialect_budget_bytes {
                break;
            }
            if prefix.bytes().filter(|&b| b == b'\n').count() >= cfg.dialect_budget_lines {
                break;
            }
            match self.source.next_chunk() {
                Ok(Chunk::Data(bytes)) => {
                    prefix.push_str(&decode_to_string(&mut decoder, &bytes));
                }
                Ok(Chunk::End) => break,
                Err(source_err) => {
                    aborted = true;
                    fatal_error = Some(source_err.to_string());
                    byte_offset = Some(self.source.total_bytes());
                    break;
                }
            }
        }

        let mut ctx = dialect::detect(&prefix, cfg.dialect_budget_lines);
        if let Some(delim) = self.overrides.delimiter {
            ctx.delimiter = delim;
            ctx.delimiter_confidence = 1.0;
        }
        info!(
            delimiter = %ctx.delimiter,
            line_terminator = ctx.line_terminator.as_str(),
            has_header = ctx.has_header,
            "dialect resolved"
        );

        let mut tokenizer = Tokenizer::new(ctx.delimiter, ctx.quote);
        let mut state = IngestState::new(cfg.clone(), ctx.has_header);

        tokenizer.push_chars(prefix.chars(), |rec| state.handle_record(rec));

        if fatal_error.is_none() {
            loop {
                if self.source.cancellation_token().is_cancelled() {
                    aborted = true;
                    byte_offset = Some(self.source.total_bytes());
                    break;
                }
                match self.source.next_chunk() {
                    Ok(Chunk::Data(bytes)) => {
                        let text = decode_to_string(&mut decoder, &bytes);
                        tokenizer.push_chars(text.chars(), |rec| state.handle_record(rec));
                    }
                    Ok(Chunk::End) => break,
                    Err(source_err) => {
                        aborted = true;
                        fatal_error = Some(source_err.to_string());
                        byte_offset = Some(self.source.total_bytes());
                        break;
                    }
                }
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            let text: String = tail.into_iter().collect();
            tokenizer.push_chars(text.chars(), |rec| state.handle_record(rec));
        }
        tokenizer.finish(|rec| state.handle_record(rec));

        if aborted {
            warn!(byte_offset, "stream aborted before completion");
        }

        let source_info = SourceInfo {
            byte_count: self.source.total_bytes(),
            encoding: decision.encoding.tag().to_string(),
            encoding_confidence: decision.confidence,
            bom_present: decision.bom_present,
            replacement_count: decoder.replacement_count,
        };
        let dialect_info = DialectInfo {
            delimiter: ctx.delimiter.to_string(),
            quote: ctx.quote.map(|c| c.to_string()),
            line_terminator: ctx.line_terminator.as_str().to_string(),
            header_present: ctx.has_header,
            confidence: ctx.delimiter_confidence,
            diagnostics: ctx.diagnostics,
        };

        info!(rows_total = state.rows_total, rows_malformed = state.rows_malformed, "finalizing report");
        Ok(state.finalize(source_info, dialect_info, aborted, fatal_error, byte_offset))
    }
}

fn decode_to_string(decoder: &mut Decoder, bytes: &[u8]) -> String {
    decoder.decode_chunk(bytes).into_iter().collect()
}

fn empty_report(cfg: &PipelineConfig) -> Report {
    let quality = quality::score(&[], 0, 0, 0.0, &cfg.quality_weights);
    Report {
        source: SourceInfo {
            byte_count: 0,
            encoding: Encoding::Utf8.tag().to_string(),
            encoding_confidence: 0.5,
            bom_present: false,
            replacement_count: 0,
        },
        dialect: DialectInfo {
            delimiter: ",".to_string(),
            quote: Some("\"".to_string()),
            line_terminator: "LF".to_string(),
            header_present: false,
            confidence: 0.0,
            diagnostics: vec!["empty_input".to_string()],
        },
        structure: StructureInfo {
            rows_total: 0,
            rows_malformed: 0,
            columns: 0,
            header: Vec::new(),
        },
        columns: Vec::new(),
        pairs: Vec::new(),
        multivariate: MultivariateReport::default(),
        quality,
        diagnostics: Diagnostics::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_text(text: &str) -> Report {
        crate::config::init(PipelineConfig::default());
        let source = ByteSource::new(Cursor::new(text.as_bytes().to_vec()), 64, "<mem>");
        let pipeline = Pipeline::new(source, PipelineOverrides::default());
        pipeline.run().unwrap()
    }

    #[test]
    fn simple_csv_produces_expected_structure() {
        let report = run_text("id,name,amount\n1,alice,10.5\n2,bob,20.25\n3,carol,5.0\n");
        assert_eq!(report.dialect.delimiter, ",");
        assert_eq!(report.structure.columns, 3);
        assert_eq!(report.structure.rows_total, 3);
        assert_eq!(report.structure.header, vec!["id", "name", "amount"]);
    }

    #[test]
    fn malformed_rows_are_counted_and_excluded() {
        let report = run_text("a,b\n1,2\n3,4,5\n6,7\n");
        assert_eq!(report.structure.rows_malformed, 1);
        assert_eq!(report.structure.rows_total, 3);
    }

    #[test]
    fn empty_input_yields_zeroed_report() {
        let report = run_text("");
        assert_eq!(report.structure.rows_total, 0);
        assert_eq!(report.structure.columns, 0);
        assert_eq!(report.quality.dimensions.completeness, 100.0);
    }

    #[test]
    fn cancellation_mid_stream_marks_aborted() {
        crate::config::init(PipelineConfig::default());
        let mut text = String::from("a,b\n");
        for i in 0..10_000 {
            text.push_str(&format!("{i},{i}\n"));
        }
        let source = ByteSource::new(Cursor::new(text.into_bytes()), 64, "<mem>");
        let pipeline = Pipeline::new(source, PipelineOverrides::default());
        let token = pipeline.cancellation_token();
        token.cancel();
        let report = pipeline.run().unwrap();
        assert!(report.diagnostics.aborted);
    }
}
