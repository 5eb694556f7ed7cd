//! Crawl orchestration engine
//!
//! This module contains the core crawling logic, including:
//! - Listing extraction with run-wide item indices
//! - The pagination state machine
//! - Bounded concurrent detail extraction
//! - Stage-tagged error bookkeeping
//! - Overall crawl coordination

mod coordinator;
pub mod errors;
pub mod listing;
pub mod pagination;
pub mod scheduler;

pub use coordinator::{CrawlOptions, CrawlResult, Coordinator, PageCallback};
pub use errors::{categorize, CrawlError, CrawlErrorManager, ErrorStage};
pub use listing::{extract_listing, ListingItem, ListingPage};
pub use pagination::{AdvanceOutcome, CrawlTimings, NotAdvancedReason, PaginationController};
pub use scheduler::{extract_concurrently, SchedulerOptions, SchedulerReport};
