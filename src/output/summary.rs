//! Run summaries
//!
//! A [`CrawlSummary`] is the caller-facing result of one crawl: the run
//! counters, per-field extraction stats and categorized errors of a session.

use crate::state::{FieldStatsTable, RunContext, SessionMetadata, StopReason};
use crate::storage::{SessionRecord, Storage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Session {0} not found")]
    SessionNotFound(i64),

    #[error("Invalid timestamp '{0}'")]
    Timestamp(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Outcome of one crawl session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub session_id: i64,
    pub source_id: String,
    pub pages_processed: u64,
    pub items_found: u64,
    pub items_processed: u64,
    pub items_with_errors: u64,
    pub duplicates_skipped: u64,
    pub total_filtered_items: u64,
    pub stopped_reason: Option<StopReason>,
    pub listing_field_stats: FieldStatsTable,
    pub content_field_stats: FieldStatsTable,
    pub listing_errors: Vec<String>,
    pub content_errors: Vec<String>,
    pub content_warnings: Vec<String>,
    pub config_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    /// `None` while the session is still running
    pub ended_at: Option<DateTime<Utc>>,
}

impl CrawlSummary {
    /// Builds the summary of a finished run
    pub fn from_run(ctx: &RunContext, ended_at: DateTime<Utc>) -> Self {
        Self::from_metadata(
            ctx.session_id,
            &ctx.source_id,
            &ctx.metadata,
            ctx.started_at,
            Some(ended_at),
        )
    }

    /// Rebuilds a summary from a persisted session row
    pub fn from_session(record: &SessionRecord) -> OutputResult<Self> {
        let started_at = parse_timestamp(&record.start_time)?;
        let ended_at = record
            .end_time
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        Ok(Self::from_metadata(
            record.id,
            &record.source_id,
            &record.metadata,
            started_at,
            ended_at,
        ))
    }

    fn from_metadata(
        session_id: i64,
        source_id: &str,
        metadata: &SessionMetadata,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            session_id,
            source_id: source_id.to_string(),
            pages_processed: metadata.pages_processed,
            items_found: metadata.items_found,
            items_processed: metadata.items_processed,
            items_with_errors: metadata.items_with_errors,
            duplicates_skipped: metadata.duplicates_skipped,
            total_filtered_items: metadata.total_filtered_items,
            stopped_reason: metadata.stopped_reason,
            listing_field_stats: metadata.listing_field_stats.clone(),
            content_field_stats: metadata.content_field_stats.clone(),
            listing_errors: metadata.listing_errors.clone(),
            content_errors: metadata.content_errors.clone(),
            content_warnings: metadata.content_warnings.clone(),
            config_hash: metadata.config_hash.clone(),
            started_at,
            ended_at,
        }
    }

    /// Seconds between start and end, if the session ended
    pub fn duration_seconds(&self) -> Option<i64> {
        self.ended_at.map(|end| (end - self.started_at).num_seconds())
    }

    /// Checks `items_found = items_processed + duplicates_skipped + total_filtered_items`
    pub fn is_balanced(&self) -> bool {
        self.items_found == self.items_processed + self.duplicates_skipped + self.total_filtered_items
    }

    pub fn total_errors(&self) -> usize {
        self.listing_errors.len() + self.content_errors.len()
    }
}

fn parse_timestamp(value: &str) -> OutputResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| OutputError::Timestamp(value.to_string()))
}

/// Loads the summary of a stored session
///
/// # Arguments
///
/// * `storage` - The storage backend holding the session
/// * `session_id` - The session to summarize
pub fn load_session_summary(storage: &dyn Storage, session_id: i64) -> OutputResult<CrawlSummary> {
    let record = storage
        .get_session(session_id)?
        .ok_or(OutputError::SessionNotFound(session_id))?;
    CrawlSummary::from_session(&record)
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Session {} ({}) ===", summary.session_id, summary.source_id);
    println!(
        "  Stopped: {}",
        summary
            .stopped_reason
            .map(|r| r.as_str())
            .unwrap_or("still running")
    );
    if let Some(seconds) = summary.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    println!("  Pages processed: {}", summary.pages_processed);
    println!("  Items found: {}", summary.items_found);
    println!(
        "  Items processed: {} ({} with errors)",
        summary.items_processed, summary.items_with_errors
    );
    println!("  Duplicates skipped: {}", summary.duplicates_skipped);
    println!("  Filtered: {}", summary.total_filtered_items);

    for (label, table) in [
        ("Listing fields", &summary.listing_field_stats),
        ("Content fields", &summary.content_field_stats),
    ] {
        if table.is_empty() {
            continue;
        }
        println!("  {}:", label);
        for stats in table.iter() {
            println!(
                "    {:<16} {:>5}/{:<5} {:>6.1}%{}",
                stats.field_name,
                stats.success_count,
                stats.total_attempts,
                stats.success_rate(),
                if stats.is_optional { " (optional)" } else { "" }
            );
        }
    }

    println!(
        "  Errors: {} listing, {} content; {} warning(s)",
        summary.listing_errors.len(),
        summary.content_errors.len(),
        summary.content_warnings.len()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, SourceConfig};
    use crate::storage::SqliteStorage;
    use std::collections::BTreeMap;

    fn source() -> SourceConfig {
        let mut listing_fields = BTreeMap::new();
        listing_fields.insert("title".to_string(), FieldConfig::text("h2"));
        SourceConfig {
            id: "news".to_string(),
            name: "News".to_string(),
            listing_url: "https://example.com/".to_string(),
            container_selector: "li".to_string(),
            listing_fields,
            pagination: None,
            detail_container_selector: None,
            detail_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_from_run_copies_counters() {
        let mut ctx = RunContext::new(3, &source(), Some("hash".to_string()));
        ctx.metadata.pages_processed = 2;
        ctx.metadata.items_found = 4;
        ctx.metadata.items_processed = 3;
        ctx.metadata.total_filtered_items = 1;
        ctx.metadata.listing_field_stats.record("title", 0, true);
        ctx.stop(StopReason::NoNextButton);

        let ended = ctx.started_at + chrono::Duration::seconds(12);
        let summary = CrawlSummary::from_run(&ctx, ended);

        assert_eq!(summary.session_id, 3);
        assert_eq!(summary.stopped_reason, Some(StopReason::NoNextButton));
        assert_eq!(summary.duration_seconds(), Some(12));
        assert_eq!(summary.listing_field_stats["title"].success_count, 1);
        assert!(summary.is_balanced());
    }

    #[test]
    fn test_load_session_summary() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut metadata = SessionMetadata {
            items_found: 2,
            items_processed: 2,
            ..SessionMetadata::default()
        };
        let id = storage.create_session("news", "News", &metadata).unwrap();

        let running = load_session_summary(&storage, id).unwrap();
        assert_eq!(running.ended_at, None);

        metadata.stopped_reason = Some(StopReason::MaxPagesReached);
        storage.end_session(id, &metadata).unwrap();

        let summary = load_session_summary(&storage, id).unwrap();
        assert_eq!(summary.items_processed, 2);
        assert_eq!(summary.stopped_reason, Some(StopReason::MaxPagesReached));
        assert!(summary.ended_at.is_some());

        assert!(matches!(
            load_session_summary(&storage, 999),
            Err(OutputError::SessionNotFound(999))
        ));
    }
}
