//! Storage module for persisting harvested content
//!
//! - `SqliteStorage`: content metadata, sessions and the session/content
//!   link table in SQLite
//! - `ContentStore`: full items as hash-keyed JSON files on disk

mod content;
mod schema;
mod sqlite;
mod traits;

pub use content::{content_hash, ContentStore, StoredContent};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::SessionMetadata;
use chrono::{DateTime, Utc};

/// Represents a stored article in the database
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: i64,
    pub hash: String,
    pub source: String,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub crawled_at: String,
    pub created_at: String,
}

/// Represents a harvesting session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: i64,
    pub source_id: String,
    pub source_name: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Represents one content row stored by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContentRecord {
    pub session_id: i64,
    pub content_id: i64,
    pub processed_order: i64,
    pub had_content_extraction_error: bool,
}

/// Filters for browsing stored content
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub source: Option<String>,
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// WAL checkpoint strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    /// Copies what it can without blocking writers
    Passive,
    /// Copies everything and truncates the WAL file
    Truncate,
}

impl CheckpointMode {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Passive => "PASSIVE",
            Self::Truncate => "TRUNCATE",
        }
    }
}
