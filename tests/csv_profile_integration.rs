//! CSV Profile Integration Test
//!
//! Lightweight smoke tests that exercise the core pipeline path end to end:
//! feed an in-memory or on-disk CSV through `Pipeline::run` and verify the
//! resulting `Report` rather than any one component in isolation.

use std::io::Cursor;
use std::io::Write;

use tablescan::infer::{PrimaryType, SemanticTag};
use tablescan::pipeline::{Pipeline, PipelineOverrides};
use tablescan::source::ByteSource;

fn run_str(csv: &str) -> tablescan::Report {
    let source = ByteSource::new(Cursor::new(csv.as_bytes().to_vec()), 64 * 1024, "<mem>");
    let pipeline = Pipeline::new(source, PipelineOverrides::default());
    pipeline.run().expect("pipeline run should not hit a fatal I/O error")
}

/// Four-column CSV with a header and a roughly-normal amount column.
/// Mirrors the baseline fixture shape used across the other scenario tests.
fn baseline_csv(rows: usize) -> String {
    let mut out = String::from("id,name,amount,signup_date\n");
    for i in 0..rows {
        let amount = 100.0 + 15.0 * ((i as f64 * 0.37).sin());
        out.push_str(&format!(
            "{},user_{},{:.2},2023-0{}-15\n",
            i,
            i,
            amount,
            (i % 9) + 1
        ));
    }
    out
}

#[test]
fn baseline_csv_produces_expected_column_types() {
    let report = run_str(&baseline_csv(500));

    assert_eq!(report.structure.rows_total, 500);
    assert_eq!(report.structure.columns, 4);
    assert!(!report.diagnostics.aborted);

    let by_name = |name: &str| {
        report
            .columns
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("no column named {name}"))
    };

    assert_eq!(by_name("id").primary_type, PrimaryType::Integer);
    assert_eq!(by_name("id").semantic_tag, SemanticTag::Identifier);
    assert_eq!(by_name("amount").primary_type, PrimaryType::Float);
    assert_eq!(by_name("signup_date").primary_type, PrimaryType::DateTime);

    let amount = by_name("amount");
    assert!(amount.mean.is_some());
    assert!(amount.std.is_some());
}

/// UTF-8 BOM, semicolon delimiter, CRLF line endings: every non-default
/// dialect/encoding choice at once, to check they don't interfere.
#[test]
fn bom_semicolon_crlf_dialect_is_detected_without_override() {
    let mut bytes: Vec<u8> = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"id;score\r\n1;10\r\n2;20\r\n3;30\r\n");

    let source = ByteSource::new(Cursor::new(bytes), 64 * 1024, "<mem>");
    let pipeline = Pipeline::new(source, PipelineOverrides::default());
    let report = pipeline.run().unwrap();

    assert_eq!(report.dialect.delimiter, ";");
    assert_eq!(report.structure.rows_total, 3);
    assert_eq!(report.structure.header, vec!["id", "score"]);
}

/// A file where roughly a tenth of the rows are short (missing a trailing
/// field) should be counted as malformed and excluded from per-column stats.
#[test]
fn malformed_row_share_is_reflected_in_structure_and_integrity() {
    let mut csv = String::from("a,b,c\n");
    for i in 0..200 {
        if i % 10 == 0 {
            csv.push_str(&format!("{i},{i}\n"));
        } else {
            csv.push_str(&format!("{i},{i},{i}\n"));
        }
    }
    let report = run_str(&csv);

    assert_eq!(report.structure.rows_total, 200);
    assert_eq!(report.structure.rows_malformed, 20);
    assert!(
        report.quality.dimensions.integrity < 100.0,
        "malformed rows should depress the integrity dimension"
    );
}

/// Two perfectly linearly-correlated numeric columns should produce a
/// Pearson correlation near 1.0 and a dominant first principal component.
#[test]
fn perfectly_correlated_columns_report_strong_pearson_and_pca() {
    let mut csv = String::from("x,y\n");
    for i in 1..=300 {
        let x = i as f64;
        let y = 2.0 * x + 1.0;
        csv.push_str(&format!("{x},{y}\n"));
    }
    let report = run_str(&csv);

    assert_eq!(report.pairs.len(), 1);
    let pearson = report.pairs[0].pearson.expect("pearson should be defined");
    assert!((pearson - 1.0).abs() < 1e-6, "pearson={pearson}");

    let pca = report
        .multivariate
        .pca
        .expect("pca should run with >=2 numeric columns and enough points");
    assert!(
        pca.explained_variance[0] > 0.99,
        "first component should explain nearly all variance: {:?}",
        pca.explained_variance
    );
}

/// Duplicate rows should be reflected in a depressed uniqueness dimension.
#[test]
fn duplicate_rows_depress_uniqueness() {
    let mut csv = String::from("a,b\n");
    for _ in 0..100 {
        csv.push_str("1,2\n");
    }
    for i in 0..100 {
        csv.push_str(&format!("{i},{i}\n"));
    }
    let report = run_str(&csv);

    assert!(
        report.quality.dimensions.uniqueness < 90.0,
        "uniqueness={}",
        report.quality.dimensions.uniqueness
    );
}

/// Empty input should produce a zeroed, non-aborted report rather than an
/// error — there is nothing fatal about an empty file.
#[test]
fn empty_file_on_disk_yields_zeroed_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    std::fs::File::create(&path).unwrap();

    let source = ByteSource::from_path(&path, 64 * 1024).unwrap();
    let pipeline = Pipeline::new(source, PipelineOverrides::default());
    let report = pipeline.run().unwrap();

    assert_eq!(report.structure.rows_total, 0);
    assert!(!report.diagnostics.aborted);
}

/// Cancelling mid-stream (via the pipeline's own cancellation token, the
/// same mechanism the CLI's timeout thread uses) should mark the report
/// aborted and record a byte offset rather than returning a fatal error.
#[test]
fn cancellation_token_marks_report_aborted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.csv");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "a,b").unwrap();
        for i in 0..50_000 {
            writeln!(f, "{i},{i}").unwrap();
        }
    }

    let source = ByteSource::from_path(&path, 4096).unwrap();
    let pipeline = Pipeline::new(source, PipelineOverrides::default());
    let token = pipeline.cancellation_token();
    token.cancel();

    let report = pipeline.run().unwrap();
    assert!(report.diagnostics.aborted);
    assert!(report.diagnostics.byte_offset.is_some());
}
