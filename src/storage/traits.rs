//! Storage traits and error types
//!
//! This module defines the trait interface for the metadata store and
//! associated error types.

use crate::state::{CrawledItem, SessionMetadata};
use crate::storage::{
    CheckpointMode, ContentQuery, ContentRecord, SessionContentRecord, SessionRecord,
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Content already stored for URL: {0}")]
    DuplicateUrl(String),

    #[error("Invalid published date '{value}' for {url}: expected RFC 3339")]
    InvalidDate { url: String, value: String },

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Session already ended: {0}")]
    SessionAlreadyEnded(i64),

    #[error("Corrupted content file {path}: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for metadata store implementations
///
/// Writes take `&mut self`; the orchestrator is the only writer during a run.
pub trait Storage {
    // ===== Content =====

    /// Inserts one article row
    ///
    /// # Arguments
    ///
    /// * `item` - The harvested item
    /// * `hash` - Content-store hash of the item's URL
    ///
    /// # Returns
    ///
    /// The row id, [`StorageError::DuplicateUrl`] when the URL is already
    /// stored, or [`StorageError::InvalidDate`] when `published_date` is not
    /// RFC 3339.
    fn store_content(&mut self, item: &CrawledItem, hash: &str) -> StorageResult<i64>;

    /// Returns the subset of `urls` already stored, in one batched lookup
    fn get_existing_urls(&self, urls: &[String]) -> StorageResult<HashSet<String>>;

    /// Checks whether a single URL is stored
    fn url_exists(&self, url: &str) -> StorageResult<bool>;

    /// Gets an article by its content hash
    fn get_by_hash(&self, hash: &str) -> StorageResult<Option<ContentRecord>>;

    /// Lists articles matching the filters, newest publication first
    fn query(&self, query: &ContentQuery) -> StorageResult<Vec<ContentRecord>>;

    /// Lists articles of one source
    fn get_by_source(&self, source: &str, limit: Option<u32>) -> StorageResult<Vec<ContentRecord>>;

    /// Number of stored articles per source
    fn count_by_source(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Distinct source ids with stored content
    fn get_sources(&self) -> StorageResult<Vec<String>>;

    /// Deletes every article of a source; session links cascade
    fn delete_content_by_source(&mut self, source: &str) -> StorageResult<u64>;

    // ===== Sessions =====

    /// Opens a session and returns its id
    fn create_session(
        &mut self,
        source_id: &str,
        source_name: &str,
        metadata: &SessionMetadata,
    ) -> StorageResult<i64>;

    /// Replaces the metadata snapshot of a session
    fn update_session(&mut self, session_id: i64, metadata: &SessionMetadata) -> StorageResult<()>;

    /// Stamps the end time with the final snapshot; only an active session can end
    fn end_session(&mut self, session_id: i64, metadata: &SessionMetadata) -> StorageResult<()>;

    fn get_session(&self, session_id: i64) -> StorageResult<Option<SessionRecord>>;

    fn is_session_active(&self, session_id: i64) -> StorageResult<bool>;

    /// Sessions of one source, newest first
    fn get_sessions_by_source(&self, source_id: &str) -> StorageResult<Vec<SessionRecord>>;

    /// Deletes every session of a source; content links cascade
    fn delete_sessions_by_source(&mut self, source_id: &str) -> StorageResult<u64>;

    /// Appends a content row to a session and returns its processing order
    fn link_content_to_session(
        &mut self,
        session_id: i64,
        content_id: i64,
        had_content_extraction_error: bool,
    ) -> StorageResult<i64>;

    /// Content links of a session in processing order
    fn get_session_content(&self, session_id: i64) -> StorageResult<Vec<SessionContentRecord>>;

    // ===== Maintenance =====

    /// Runs a WAL checkpoint; failures are logged, never returned
    fn checkpoint(&self, mode: CheckpointMode);

    // ===== Statistics =====

    fn count_content(&self) -> StorageResult<u64>;

    fn count_sessions(&self) -> StorageResult<u64>;
}
