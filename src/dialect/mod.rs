//! Component C: Dialect Detector.
//!
//! Consumes a bounded prefix of the scalar stream (spec §4.C) and selects
//! delimiter, quote character, line terminator, and header presence with
//! a confidence score. Never fails; an unstable input degrades to a
//! low-confidence comma fallback plus a `dialect_uncertain` diagnostic.

use serde::Serialize;

/// Line terminator convention detected in the budget window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineTerminator {
    Lf,
    Crlf,
    Cr,
}

impl LineTerminator {
    pub fn as_str(self) -> &'static str {
        match self {
            LineTerminator::Lf => "LF",
            LineTerminator::Crlf => "CRLF",
            LineTerminator::Cr => "CR",
        }
    }
}

const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Immutable parse context, fixed after detection (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct ParseContext {
    pub delimiter: char,
    pub quote: Option<char>,
    pub line_terminator: LineTerminator,
    pub has_header: bool,
    /// Per-field detection confidence: (delimiter, line_terminator, header).
    pub delimiter_confidence: f64,
    pub line_terminator_confidence: f64,
    pub header_confidence: f64,
    pub diagnostics: Vec<String>,
}

struct DelimiterScore {
    delimiter: char,
    score: f64,
    field_counts: Vec<usize>,
}

/// Tokenize `text` against `delimiter` with `"` as quote, honoring basic
/// quoting so embedded delimiters inside quotes don't split a field. This
/// is a lightweight scan used only for scoring candidates, not the full
/// tokenizer FSM (Component D) used for the real parse.
fn line_field_counts(text: &str, delimiter: char) -> Vec<usize> {
    let mut counts = Vec::new();
    let mut field_count = 1usize;
    let mut in_quotes = false;
    let mut saw_any_char = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        saw_any_char = true;
        match c {
            '"' => in_quotes = !in_quotes,
            d if d == delimiter && !in_quotes => field_count += 1,
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                counts.push(field_count);
                field_count = 1;
                saw_any_char = false;
            }
            '\n' => {
                counts.push(field_count);
                field_count = 1;
                saw_any_char = false;
            }
            _ => {}
        }
    }
    if saw_any_char {
        counts.push(field_count);
    }
    counts
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

fn coefficient_of_variation(values: &[usize]) -> f64 {
    let m = mean(values);
    if m == 0.0 || values.len() < 2 {
        return f64::INFINITY;
    }
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - m;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt() / m
}

fn modal_count(values: &[usize]) -> (usize, f64) {
    use std::collections::HashMap;
    if values.is_empty() {
        return (0, 0.0);
    }
    let mut tally: HashMap<usize, usize> = HashMap::new();
    for &v in values {
        *tally.entry(v).or_insert(0) += 1;
    }
    let (mode, count) = tally
        .into_iter()
        .max_by_key(|&(_, c)| c)
        .unwrap_or((0, 0));
    (mode, count as f64 / values.len() as f64)
}

fn score_delimiter(text: &str, delimiter: char) -> DelimiterScore {
    let counts = line_field_counts(text, delimiter);
    if counts.is_empty() {
        return DelimiterScore {
            delimiter,
            score: 0.0,
            field_counts: counts,
        };
    }
    let (mode, mode_freq) = modal_count(&counts);
    let cv = coefficient_of_variation(&counts);
    let cv_term = (1.0 - cv.min(1.0)).max(0.0);
    let mut score = mode_freq * cv_term;
    if mode <= 1 {
        score *= 0.25; // penalize modes of 1 (no real splitting happening)
    }
    DelimiterScore {
        delimiter,
        score,
        field_counts: counts,
    }
}

/// Detect the dialect from the first `budget_bytes`/`budget_lines` of the
/// decoded scalar stream, whichever comes first.
pub fn detect(prefix: &str, budget_lines: usize) -> ParseContext {
    let mut diagnostics = Vec::new();
    let truncated: String = prefix.lines().take(budget_lines).collect::<Vec<_>>().join("\n");
    let text = if truncated.is_empty() { prefix } else { truncated.as_str() };

    let mut scores: Vec<DelimiterScore> = CANDIDATE_DELIMITERS
        .iter()
        .map(|&d| score_delimiter(text, d))
        .collect();

    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let all_unstable = scores.iter().all(|s| {
        coefficient_of_variation(&s.field_counts) > crate::config::defaults::DIALECT_CV_CEILING
    });

    let (delimiter, confidence) = if all_unstable || scores.is_empty() {
        diagnostics.push("dialect_uncertain".to_string());
        (',', 0.1)
    } else {
        let best = &scores[0];
        let max_score = scores.iter().map(|s| s.score).fold(0.0_f64, f64::max);
        let confidence = if max_score > 0.0 {
            (best.score / max_score).min(1.0)
        } else {
            0.1
        };
        (best.delimiter, confidence)
    };

    let (line_terminator, lt_confidence) = detect_line_terminator(text);
    let lines: Vec<&str> = split_lines(text, line_terminator).collect();
    let non_empty: Vec<&str> = lines.iter().copied().filter(|l| !l.trim().is_empty()).collect();
    let (has_header, header_confidence) = detect_header(&non_empty, delimiter);

    ParseContext {
        delimiter,
        quote: Some('"'),
        line_terminator,
        has_header,
        delimiter_confidence: confidence,
        line_terminator_confidence: lt_confidence,
        header_confidence,
        diagnostics,
    }
}

fn split_lines(text: &str, term: LineTerminator) -> impl Iterator<Item = &str> {
    match term {
        LineTerminator::Crlf => text.split("\r\n"),
        LineTerminator::Lf => text.split('\n'),
        LineTerminator::Cr => text.split('\r'),
    }
}

fn detect_line_terminator(text: &str) -> (LineTerminator, f64) {
    let mut crlf = 0usize;
    let mut lone_lf = 0usize;
    let mut lone_cr = 0usize;
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            '\r' => {
                if bytes.get(i + 1) == Some(&'\n') {
                    crlf += 1;
                    i += 1;
                } else {
                    lone_cr += 1;
                }
            }
            '\n' => lone_lf += 1,
            _ => {}
        }
        i += 1;
    }
    let total = crlf + lone_lf + lone_cr;
    if total == 0 {
        return (LineTerminator::Lf, 0.5);
    }
    let (term, count) = [
        (LineTerminator::Crlf, crlf),
        (LineTerminator::Lf, lone_lf),
        (LineTerminator::Cr, lone_cr),
    ]
    .into_iter()
    .max_by_key(|&(_, c)| c)
    .unwrap();
    (term, count as f64 / total as f64)
}

/// Compare the first non-empty record to the second: if the first record
/// has no numerics and the second has at least one, a header is present.
fn detect_header(non_empty_lines: &[&str], delimiter: char) -> (bool, f64) {
    if non_empty_lines.len() < 2 {
        return (true, 0.5); // default to present when ambiguous
    }
    let first_fields: Vec<&str> = non_empty_lines[0].split(delimiter).collect();
    let second_fields: Vec<&str> = non_empty_lines[1].split(delimiter).collect();

    let first_has_numeric = first_fields.iter().any(|f| looks_numeric(f.trim()));
    let second_has_numeric = second_fields.iter().any(|f| looks_numeric(f.trim()));

    if !first_has_numeric && second_has_numeric {
        (true, 0.9)
    } else if first_has_numeric {
        (false, 0.8)
    } else {
        (true, 0.5) // ambiguous, default to present
    }
}

fn looks_numeric(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_comma_delimiter_with_header() {
        let text = "id,name,amount\n1,alice,10.5\n2,bob,20.25\n3,carol,5.0\n";
        let ctx = detect(text, 1000);
        assert_eq!(ctx.delimiter, ',');
        assert!(ctx.has_header);
        assert_eq!(ctx.line_terminator, LineTerminator::Lf);
    }

    #[test]
    fn detects_semicolon_and_crlf() {
        let text = "a;b;c\r\n1;2;3\r\n4;5;6\r\n";
        let ctx = detect(text, 1000);
        assert_eq!(ctx.delimiter, ';');
        assert_eq!(ctx.line_terminator, LineTerminator::Crlf);
    }

    #[test]
    fn single_column_falls_back_with_low_confidence() {
        let text = "onlyvalue\nanother\nthird\n";
        let ctx = detect(text, 1000);
        assert_eq!(ctx.delimiter, ',');
        assert!(ctx.delimiter_confidence <= 0.5);
    }

    #[test]
    fn no_header_when_first_row_is_numeric() {
        let text = "1,2,3\n4,5,6\n7,8,9\n";
        let ctx = detect(text, 1000);
        assert!(!ctx.has_header);
    }
}
