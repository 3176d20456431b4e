//! Date parsing and formatting

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Formats accepted for dates without an explicit offset
const NAIVE_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Formats that carry their own offset
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Parse a date string in one of the supported formats.
///
/// Dates without an offset are read as local time in `tz`.
pub fn parse_date(s: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&tz));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&tz));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(&dt, tz);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return localize(&d.and_hms_opt(0, 0, 0)?, tz);
        }
    }

    None
}

/// Local wall-clock time in `tz`. A time skipped by a DST jump is moved
/// forward by the usual one-hour gap.
fn localize(dt: &NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(dt)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(*dt + Duration::hours(1))).earliest())
}

/// Format a date with a strftime pattern, or a Moment.js-style one
/// (`YYYY-MM-DD`) when the pattern has no `%`.
///
/// Returns `None` when the pattern holds an unknown `%` specifier.
pub fn format_date(date: &DateTime<Tz>, format: &str) -> Option<String> {
    let pattern = date_pattern(format)?;
    Some(date.format(&pattern).to_string())
}

/// The strftime pattern for a date format, if chrono understands every item
pub fn date_pattern(format: &str) -> Option<String> {
    let pattern = if format.contains('%') {
        format.to_string()
    } else {
        moment_to_chrono_format(format)
    };
    if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
        None
    } else {
        Some(pattern)
    }
}

/// Split a `YYYY-MM-DD-` prefix off a file stem into (date, rest)
pub fn split_date_prefix(stem: &str) -> Option<(&str, &str)> {
    let bytes = stem.as_bytes();
    let dated = bytes.len() > 11
        && bytes[..10]
            .iter()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() })
        && bytes[10] == b'-';
    if dated {
        Some((&stem[..10], &stem[11..]))
    } else {
        None
    }
}

/// Format a date in ISO 8601 / XML schema form
pub fn date_xml(date: &DateTime<Tz>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Convert Moment.js format to chrono format
fn moment_to_chrono_format(format: &str) -> String {
    let replacements = [
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("DDDD", "%j"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("ZZ", "%z"),
        ("SSS", "%3f"),
    ];

    let mut result = format.to_string();
    for (from, to) in replacements {
        result = result.replace(from, to);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_split_date_prefix() {
        assert_eq!(split_date_prefix("2024-01-02-hello"), Some(("2024-01-02", "hello")));
        assert_eq!(split_date_prefix("2024-01-02"), None);
        assert_eq!(split_date_prefix("hello-2024-01-02"), None);
    }

    #[test]
    fn test_parse_formats() {
        let tz = Tz::UTC;
        let dt = parse_date("2024-01-15 10:30:00", tz).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 15));
        assert_eq!((dt.hour(), dt.minute()), (10, 30));

        assert!(parse_date("2024/01/15", tz).is_some());
        assert!(parse_date("2024-01-15T10:30:00Z", tz).is_some());
        assert!(parse_date("2024-01-15 10:30:00 +0200", tz).is_some());
        assert!(parse_date("not-a-date", tz).is_none());
        assert!(parse_date("2024-13-45", tz).is_none());
        assert!(parse_date("", tz).is_none());
    }

    #[test]
    fn test_offset_is_converted_to_site_zone() {
        let dt = parse_date("2024-01-15T23:30:00-05:00", Tz::UTC).unwrap();
        assert_eq!((dt.day(), dt.hour()), (16, 4));
    }

    #[test]
    fn test_naive_dates_use_site_zone() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let dt = parse_date("2024-06-01", tz).unwrap();
        assert_eq!(date_xml(&dt), "2024-06-01T00:00:00+02:00");
    }

    #[test]
    fn test_format_date() {
        let date = parse_date("2024-01-15 10:30:00", Tz::UTC).unwrap();
        assert_eq!(format_date(&date, "YYYY-MM-DD").as_deref(), Some("2024-01-15"));
        assert_eq!(format_date(&date, "%b %-d, %Y").as_deref(), Some("Jan 15, 2024"));
    }

    #[test]
    fn test_format_date_rejects_unknown_specifier() {
        let date = parse_date("2024-01-15", Tz::UTC).unwrap();
        assert_eq!(format_date(&date, "%Q"), None);
        assert_eq!(format_date(&date, "%Y-%"), None);
        assert_eq!(date_pattern("DD/MM/YYYY").as_deref(), Some("%d/%m/%Y"));
        assert_eq!(date_pattern("%Q"), None);
    }

    #[test]
    fn test_time_in_dst_gap_moves_forward() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let dt = parse_date("2024-03-31 02:30", tz).unwrap();
        assert_eq!(date_xml(&dt), "2024-03-31T03:30:00+02:00");
    }

    #[test]
    fn test_moment_to_chrono() {
        assert_eq!(moment_to_chrono_format("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(moment_to_chrono_format("HH:mm:ss"), "%H:%M:%S");
    }
}
