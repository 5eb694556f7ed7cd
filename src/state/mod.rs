//! State module for tracking a harvesting run
//!
//! # Components
//!
//! - `CrawledItem`: one harvested article, as stored
//! - `FieldExtractionStats` / `FieldStatsTable`: per-field hit and miss accounting
//! - `RunContext` / `SessionMetadata`: the accumulators a run owns and persists
//! - `StopReason`: why a run ended

mod field_stats;
mod item;
mod run_state;

// Re-export main types
pub use field_stats::{FieldExtractionStats, FieldStatsTable};
pub use item::CrawledItem;
pub use run_state::{RunContext, SessionMetadata, StopReason};
