//! Output module for run summaries and reports
//!
//! This module handles:
//! - The `CrawlSummary` returned by every crawl
//! - Archive statistics for the `--stats` mode
//! - Markdown run reports

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_report, generate_markdown_report};
pub use stats::{load_statistics, print_statistics, ArchiveStatistics};
pub use summary::{load_session_summary, print_summary, CrawlSummary, OutputError, OutputResult};
