//! Timestamp helpers shared by the sync engine and lifecycle hooks.
//!
//! Stored timestamps are fixed-width RFC 3339 UTC strings with microsecond
//! precision, so lexical order is time order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::errors::{Error, Result};

const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Formats a timestamp in the storage representation.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format(STORAGE_FORMAT).to_string()
}

/// Current time in the storage representation.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parses the timestamp shapes mobile clients send.
///
/// Accepts RFC 3339, naive date-times (taken as UTC), bare dates (midnight UTC)
/// and epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Timestamp("empty timestamp".to_string()));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        if let Some(parsed) = trimmed
            .parse::<i64>()
            .ok()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        {
            return Ok(parsed);
        }
    }

    Err(Error::Timestamp(trimmed.to_string()))
}

/// Parses a JSON timestamp value (string or epoch millis number).
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp(raw).ok(),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Parses a calendar date, accepting full timestamps too.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(trimmed).ok().map(|dt| dt.date_naive()))
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first.pred_opt()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_format_sorts_lexically() {
        let earlier = parse_timestamp("2026-01-01T09:00:00Z").unwrap();
        let later = parse_timestamp("2026-01-01T10:00:00+00:00").unwrap();
        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(format_timestamp(earlier), "2026-01-01T09:00:00.000000Z");
    }

    #[test]
    fn parses_naive_and_offset_forms() {
        let naive = parse_timestamp("2026-03-04 05:06:07.123456").unwrap();
        let offset = parse_timestamp("2026-03-04T06:06:07.123456+01:00").unwrap();
        assert_eq!(naive, offset);
    }

    #[test]
    fn parses_epoch_millis_and_bare_dates() {
        let from_millis = parse_timestamp("0").unwrap();
        assert_eq!(from_millis.timestamp(), 0);
        let date = parse_timestamp("2026-02-01").unwrap();
        assert_eq!(format_timestamp(date), "2026-02-01T00:00:00.000000Z");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("  ").is_err());
    }

    #[test]
    fn month_bounds_handles_december_and_leap_years() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first.to_string(), "2024-02-01");
        assert_eq!(last.to_string(), "2024-02-29");

        let (_, last_dec) = month_bounds(2025, 12).unwrap();
        assert_eq!(last_dec.to_string(), "2025-12-31");
        assert!(month_bounds(2025, 13).is_none());
    }
}
