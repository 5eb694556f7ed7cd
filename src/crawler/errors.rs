//! Crawl error bookkeeping
//!
//! Errors raised by the engine carry their stage from the start. Free text
//! coming from elsewhere is sorted with [`categorize`].

use crate::state::SessionMetadata;
use crate::storage::{Storage, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Phrases that mark an error as belonging to listing extraction
const LISTING_PHRASES: &[&str] = &[
    "Required field",
    "Optional field",
    "missing required fields",
    "no extractable data",
];

/// Phrases that mark an error as belonging to detail extraction
const CONTENT_PHRASES: &[&str] = &["content", "extraction", "Content page", "Content parsing"];

/// Phase of a run an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Listing,
    Content,
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listing => f.write_str("listing"),
            Self::Content => f.write_str("content"),
        }
    }
}

/// An error message tagged with its stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlError {
    pub stage: ErrorStage,
    pub message: String,
}

impl CrawlError {
    pub fn listing(message: impl Into<String>) -> Self {
        Self {
            stage: ErrorStage::Listing,
            message: message.into(),
        }
    }

    pub fn content(message: impl Into<String>) -> Self {
        Self {
            stage: ErrorStage::Content,
            message: message.into(),
        }
    }

    /// Tags free text by its wording
    pub fn untagged(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage: categorize(&message),
            message,
        }
    }
}

/// Sorts a free-text error into a stage; unknown wording counts as content
pub fn categorize(message: &str) -> ErrorStage {
    if LISTING_PHRASES.iter().any(|p| message.contains(p)) {
        return ErrorStage::Listing;
    }
    if CONTENT_PHRASES.iter().any(|p| message.contains(p)) {
        return ErrorStage::Content;
    }
    ErrorStage::Content
}

/// Appends errors to a session's metadata and persists the snapshot
#[derive(Debug, Clone, Copy)]
pub struct CrawlErrorManager {
    session_id: i64,
}

impl CrawlErrorManager {
    pub fn new(session_id: i64) -> Self {
        Self { session_id }
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Adds messages of one stage; an empty list touches nothing
    pub fn add_errors(
        &self,
        storage: &mut dyn Storage,
        metadata: &mut SessionMetadata,
        stage: ErrorStage,
        messages: Vec<String>,
    ) -> StorageResult<()> {
        if messages.is_empty() {
            return Ok(());
        }

        debug!(
            "Session {}: recording {} {} error(s)",
            self.session_id,
            messages.len(),
            stage
        );
        match stage {
            ErrorStage::Listing => metadata.listing_errors.extend(messages),
            ErrorStage::Content => metadata.content_errors.extend(messages),
        }
        storage.update_session(self.session_id, metadata)
    }

    /// Adds tagged errors, each under its own stage, with one write
    pub fn record(
        &self,
        storage: &mut dyn Storage,
        metadata: &mut SessionMetadata,
        errors: Vec<CrawlError>,
    ) -> StorageResult<()> {
        if errors.is_empty() {
            return Ok(());
        }

        for error in errors {
            match error.stage {
                ErrorStage::Listing => metadata.listing_errors.push(error.message),
                ErrorStage::Content => metadata.content_errors.push(error.message),
            }
        }
        storage.update_session(self.session_id, metadata)
    }

    /// Adds free-text errors after sorting them by wording
    pub fn add_untagged(
        &self,
        storage: &mut dyn Storage,
        metadata: &mut SessionMetadata,
        messages: Vec<String>,
    ) -> StorageResult<()> {
        let errors = messages.into_iter().map(CrawlError::untagged).collect();
        self.record(storage, metadata, errors)
    }
}
