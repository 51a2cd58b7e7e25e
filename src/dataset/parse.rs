//! Text-level parsing shared by the upstream readers.

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use csv::StringRecord;

use crate::error::DatasetError;

/// Accepted timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Layout used when writing timestamps.
pub const CANONICAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a timestamp in any accepted layout. RFC 3339 offsets are dropped
/// after conversion to the local wall clock they carry.
///
/// # Examples
///
/// ```
/// use evhub_sim::dataset::parse::parse_timestamp;
///
/// let a = parse_timestamp("2024-03-01 13:00").unwrap();
/// let b = parse_timestamp("01/03/2024 13:00").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local())
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_TIMESTAMP_FORMAT).to_string()
}

/// Parses a number, optionally in decimal-comma convention
/// (`1.234,5` means 1234.5).
pub fn parse_number(s: &str, decimal_comma: bool) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if decimal_comma {
        s.replace('.', "").replace(',', ".").parse().ok()
    } else {
        s.parse().ok()
    }
}

/// Parses a 0/1 or true/false flag.
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Some(true),
        "0" | "0.0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Picks `;` when the header line uses it, otherwise `,`.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    if header.contains(';') { b';' } else { b',' }
}

/// Index of the first header matching any alias, case-insensitively.
pub fn column_index(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().trim_start_matches('\u{feff}');
        aliases.iter().any(|a| h.eq_ignore_ascii_case(a))
    })
}

/// Reads a whole upstream file, tagging failures with its path.
pub fn read_text(path: &Path) -> Result<String, DatasetError> {
    fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })
}
