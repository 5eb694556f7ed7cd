//! Extraction of typed values from page snapshots
//!
//! - [`contract`]: selector-driven field extraction over HTML
//! - [`date`]: normalization of published dates to ISO-8601

pub mod contract;
mod date;

pub use contract::{extract_fields, extract_first, extract_page, FieldExtraction, PageExtraction};
pub use date::{parse_published_date, DateParseError, ISO_FORMAT};
