//! Date-time pattern matching for the type inferencer (spec §4.E).
//!
//! Patterns are tried in priority order; the first match wins. This is
//! deliberately not a general date parser — it only needs to *classify*
//! a value as date-time-shaped, not round-trip it, though it does parse
//! far enough to validate real calendar values (reject `2024-13-40`).

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

static ISO8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$").unwrap()
});
static YMD_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static YMD_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}/\d{2}/\d{2}$").unwrap());
static DMY_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());
static DATETIME_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap());
static EPOCH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{9,13}$").unwrap());

/// Attempt to classify `value` as a date-time under any of the
/// recognized patterns, in priority order. Returns `true` only if it is
/// both pattern-shaped *and* semantically valid (e.g. month 1-12).
pub fn matches(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() {
        return false;
    }

    if ISO8601.is_match(v) || DATETIME_SPACE.is_match(v) {
        let normalized = v.replacen('T', " ", 1);
        let normalized = normalized
            .trim_end_matches('Z')
            .splitn(2, '+')
            .next()
            .unwrap_or(&normalized);
        return NaiveDateTime::parse_from_str(normalized, "%Y-%m-%d %H:%M:%S").is_ok()
            || NaiveDateTime::parse_from_str(&format!("{normalized}.0"), "%Y-%m-%d %H:%M:%S%.f")
                .is_ok();
    }

    if YMD_DASH.is_match(v) {
        return NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok();
    }
    if YMD_SLASH.is_match(v) {
        return NaiveDate::parse_from_str(v, "%Y/%m/%d").is_ok();
    }
    if DMY_SLASH.is_match(v) {
        return NaiveDate::parse_from_str(v, "%d/%m/%Y").is_ok()
            || NaiveDate::parse_from_str(v, "%m/%d/%Y").is_ok();
    }
    if EPOCH.is_match(v) {
        if let Ok(n) = v.parse::<i64>() {
            let seconds = if v.len() >= 13 { n / 1000 } else { n };
            return Utc.timestamp_opt(seconds, 0).single().is_some();
        }
    }

    false
}

/// Parse `value` into a UTC timestamp using the same pattern set as
/// [`matches`]. Used by the kernel's date-time estimator once a column
/// has been decided as date-time.
pub fn parse(value: &str) -> Option<chrono::DateTime<Utc>> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if ISO8601.is_match(v) || DATETIME_SPACE.is_match(v) {
        let normalized = v.replacen('T', " ", 1);
        let normalized = normalized
            .trim_end_matches('Z')
            .splitn(2, '+')
            .next()
            .unwrap_or(&normalized)
            .to_string();
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S") {
            return Some(Utc.from_utc_datetime(&ndt));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    if YMD_DASH.is_match(v) {
        if let Ok(d) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
            return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }
    if YMD_SLASH.is_match(v) {
        if let Ok(d) = NaiveDate::parse_from_str(v, "%Y/%m/%d") {
            return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }
    if DMY_SLASH.is_match(v) {
        if let Ok(d) = NaiveDate::parse_from_str(v, "%d/%m/%Y")
            .or_else(|_| NaiveDate::parse_from_str(v, "%m/%d/%Y"))
        {
            return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap()));
        }
    }
    if EPOCH.is_match(v) {
        if let Ok(n) = v.parse::<i64>() {
            let seconds = if v.len() >= 13 { n / 1000 } else { n };
            return Utc.timestamp_opt(seconds, 0).single();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_iso8601() {
        assert!(matches("2024-01-15T10:30:00Z"));
        assert!(matches("2024-01-15 10:30:00"));
    }

    #[test]
    fn recognizes_date_only_variants() {
        assert!(matches("2024-01-15"));
        assert!(matches("2024/01/15"));
        assert!(matches("15/01/2024"));
    }

    #[test]
    fn rejects_invalid_calendar_dates() {
        assert!(!matches("2024-13-40"));
    }

    #[test]
    fn recognizes_epoch_seconds_and_millis() {
        assert!(matches("1700000000"));
        assert!(matches("1700000000000"));
    }

    #[test]
    fn rejects_plain_numbers_that_arent_dates() {
        assert!(!matches("42"));
        assert!(!matches("3.14"));
    }
}
