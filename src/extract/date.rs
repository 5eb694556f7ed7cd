use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Format every published date is stored in
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Date-only formats seen on listing pages, tried in order
const DATE_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%b %d, %Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
    "%Y-%m-%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("Empty date value")]
    Empty,

    #[error("Unrecognized date format: '{0}'")]
    Unrecognized(String),
}

/// Parses a published date as written on a page into ISO-8601 UTC
///
/// Accepts RFC 3339, RFC 2822, naive date-times and the common written
/// forms ("July 10, 2025", "10 Jul 2025", "07/10/2025", ...). Ordinal
/// suffixes ("10th") and a leading "Published"/"Updated" label are ignored.
///
/// # Examples
///
/// ```
/// use folio_harvest::parse_published_date;
///
/// let iso = parse_published_date("July 10, 2025").unwrap();
/// assert_eq!(iso, "2025-07-10T00:00:00.000Z");
/// assert_eq!(parse_published_date(&iso).unwrap(), iso);
/// ```
pub fn parse_published_date(raw: &str) -> Result<String, DateParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(format_utc(dt.with_timezone(&Utc)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(format_utc(dt.with_timezone(&Utc)));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(format_utc(naive.and_utc()));
        }
    }

    let cleaned = clean_written_date(trimmed);
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(format_utc(naive.and_utc()));
            }
        }
    }

    Err(DateParseError::Unrecognized(trimmed.to_string()))
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format(ISO_FORMAT).to_string()
}

/// Strips labels and ordinal suffixes and collapses whitespace
fn clean_written_date(raw: &str) -> String {
    let mut text = raw;
    for label in ["Published:", "Published", "Updated:", "Updated", "Posted on", "Posted"] {
        if let Some(rest) = text.strip_prefix(label) {
            text = rest.trim_start();
            break;
        }
    }

    text.split_whitespace()
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ordinal(word: &str) -> String {
    let (body, trailing_comma) = match word.strip_suffix(',') {
        Some(body) => (body, ","),
        None => (word, ""),
    };

    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(number) = body.strip_suffix(suffix) {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return format!("{}{}", number, trailing_comma);
            }
        }
    }

    word.to_string()
}
