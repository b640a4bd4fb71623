//! Datetime detection for string values

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Detected string format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// ISO 8601 date (YYYY-MM-DD)
    Date,
    /// ISO 8601 date-time (YYYY-MM-DDTHH:MM:SS)
    DateTime,
    /// No specific format detected
    None,
}

impl Format {
    /// Whether the format classifies as `datetime`
    pub fn is_temporal(&self) -> bool {
        matches!(self, Format::Date | Format::DateTime)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Date => write!(f, "date"),
            Format::DateTime => write!(f, "date-time"),
            Format::None => write!(f, "none"),
        }
    }
}

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

// ASCII digit classes keep the byte slicing in detect_format on char boundaries.
// RavenDB writes seven fractional digits, hence the open-ended fraction.
static DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?(Z|[+-][0-9]{2}:?[0-9]{2})?$").unwrap()
});

/// Detect whether a string is an ISO-8601 date or date-time
///
/// The regex only checks the shape; the calendar date and the wall-clock time
/// are validated with chrono so that `2024-13-45` stays a plain string.
pub fn detect_format(value: &str) -> Format {
    if DATETIME_REGEX.is_match(value) {
        if valid_date(&value[..10]) && valid_time(&value[11..19]) {
            return Format::DateTime;
        }
        return Format::None;
    }

    if DATE_REGEX.is_match(value) && valid_date(value) {
        return Format::Date;
    }

    Format::None
}

/// Shorthand for `detect_format(value).is_temporal()`
pub fn is_datetime(value: &str) -> bool {
    detect_format(value).is_temporal()
}

fn valid_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn valid_time(value: &str) -> bool {
    NaiveTime::parse_from_str(value, "%H:%M:%S").is_ok()
}
