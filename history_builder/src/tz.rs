//! Timestamp parsing and formatting helpers.
//!
//! What this module provides:
//! - [`parse_ts_to_utc`]: Parse RFC-3339 timestamps with an explicit offset and convert to UTC.
//! - [`parse_naive_utc`]: Parse an offset-less `YYYY-MM-DD HH:MM:SS` timestamp, read as UTC
//!   (the shape terminal exports use for bar times).
//! - [`parse_timestamp`]: Try both of the above.
//! - [`epoch_to_utc`] / [`to_rfc3339_secs`]: Epoch seconds to a UTC instant and to the
//!   RFC-3339 text stored in `download_stats`.
//!
//! Notes:
//! - Bar times are always epoch seconds UTC in the database; text timestamps only
//!   appear in the audit table and at the terminal boundary.
//!
//! Examples
//! - RFC-3339 with offset to UTC:
//!   "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
//! - Naive terminal time: "2024-03-10 09:30:00" -> "2024-03-10T09:30:00Z"

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y.%m.%d %H:%M:%S"];

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Offset-less timestamp, interpreted as UTC.
pub fn parse_naive_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .with_context(|| format!("bad naive timestamp: {s}"))
}

/// Parses either an RFC-3339 or a naive UTC timestamp.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    parse_ts_to_utc(s).or_else(|_| parse_naive_utc(s)).ok()
}

/// Epoch seconds -> UTC. `None` when out of chrono's range.
pub fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Format a UTC datetime as an RFC-3339 string with second precision.
pub fn to_rfc3339_secs(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_rfc3339_offset_to_utc() {
        // Offset timestamp: 2024-03-10 09:30 at -05:00 -> 14:30Z
        let ts = "2024-03-10T09:30:00-05:00";
        let got = parse_ts_to_utc(ts).expect("parse");
        let want = Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let want = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();
        assert_eq!(parse_naive_utc("2024-03-10 09:30:00").unwrap(), want);
        assert_eq!(parse_naive_utc("2024.03.10 09:30:00").unwrap(), want);
        assert_eq!(parse_timestamp(" 2024-03-10T09:30:00 "), Some(want));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_ts_to_utc("yesterday").is_err());
        assert!(parse_naive_utc("2024-13-40 00:00:00").is_err());
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn epoch_formats_as_rfc3339() {
        let dt = epoch_to_utc(1_700_000_000).unwrap();
        assert_eq!(to_rfc3339_secs(dt), "2023-11-14T22:13:20Z");
        assert_eq!(epoch_to_utc(i64::MAX), None);
    }
}
