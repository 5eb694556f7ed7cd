use crate::config::SourceConfig;
use crate::state::FieldStatsTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Why a run stopped walking its listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Next button missing, hidden, disabled, or not configured
    NoNextButton,
    /// Pagination retries exhausted
    PaginationFailed,
    /// Configured page limit reached
    MaxPagesReached,
    /// Every item on a listing page was already stored
    AllDuplicates,
    /// The listing container never appeared
    ContainerNotFound,
    /// Shutdown requested
    ProcessInterrupted,
    /// Unrecoverable error
    Error,
}

impl StopReason {
    /// Converts the stop reason to its persisted string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoNextButton => "no_next_button",
            Self::PaginationFailed => "pagination_failed",
            Self::MaxPagesReached => "max_pages_reached",
            Self::AllDuplicates => "all_duplicates",
            Self::ContainerNotFound => "container_not_found",
            Self::ProcessInterrupted => "process_interrupted",
            Self::Error => "error",
        }
    }

    /// Parses a stop reason from its persisted string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "no_next_button" => Some(Self::NoNextButton),
            "pagination_failed" => Some(Self::PaginationFailed),
            "max_pages_reached" => Some(Self::MaxPagesReached),
            "all_duplicates" => Some(Self::AllDuplicates),
            "container_not_found" => Some(Self::ContainerNotFound),
            "process_interrupted" => Some(Self::ProcessInterrupted),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot persisted as a session's `metadata_json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default)]
    pub config_hash: Option<String>,
    pub pages_processed: u64,
    pub items_found: u64,
    pub items_processed: u64,
    pub items_with_errors: u64,
    pub duplicates_skipped: u64,
    pub total_filtered_items: u64,
    #[serde(default)]
    pub listing_errors: Vec<String>,
    #[serde(default)]
    pub content_errors: Vec<String>,
    #[serde(default)]
    pub content_warnings: Vec<String>,
    #[serde(default)]
    pub stopped_reason: Option<StopReason>,
    #[serde(default)]
    pub listing_field_stats: FieldStatsTable,
    #[serde(default)]
    pub content_field_stats: FieldStatsTable,
}

impl SessionMetadata {
    /// Checks `items_found = items_processed + duplicates_skipped + total_filtered_items`
    pub fn is_balanced(&self) -> bool {
        self.items_found == self.items_processed + self.duplicates_skipped + self.total_filtered_items
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Accumulators owned by the orchestrator for the duration of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub session_id: i64,
    pub source_id: String,
    pub started_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
    next_item_index: usize,
    failed_content_urls: HashSet<String>,
}

impl RunContext {
    pub fn new(session_id: i64, source: &SourceConfig, config_hash: Option<String>) -> Self {
        Self {
            session_id,
            source_id: source.id.clone(),
            started_at: Utc::now(),
            metadata: SessionMetadata {
                config_hash,
                listing_field_stats: FieldStatsTable::for_fields(&source.listing_fields),
                content_field_stats: FieldStatsTable::for_fields(&source.detail_fields),
                ..SessionMetadata::default()
            },
            next_item_index: 0,
            failed_content_urls: HashSet::new(),
        }
    }

    /// Reserves `count` global item indices and returns the first one
    ///
    /// Indices keep counting across listing pages so `missing_items`
    /// identifies an item within the whole run.
    pub fn reserve_indices(&mut self, count: usize) -> usize {
        let first = self.next_item_index;
        self.next_item_index += count;
        first
    }

    /// Marks an item whose detail extraction failed
    pub fn mark_content_failed(&mut self, url: &str) {
        self.failed_content_urls.insert(url.to_string());
    }

    pub fn had_content_error(&self, url: &str) -> bool {
        self.failed_content_urls.contains(url)
    }

    /// Records the stop reason unless one is already set
    pub fn stop(&mut self, reason: StopReason) {
        if self.metadata.stopped_reason.is_none() {
            self.metadata.stopped_reason = Some(reason);
        }
    }

    pub fn stopped_reason(&self) -> Option<StopReason> {
        self.metadata.stopped_reason
    }
}
