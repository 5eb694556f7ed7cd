//! Statistics over the harvested archive
//!
//! Reads totals and per-source counts from the storage layer for the
//! `--stats` mode of the CLI.

use crate::output::summary::{CrawlSummary, OutputResult};
use crate::storage::Storage;

/// Archive-wide totals
#[derive(Debug, Clone, Default)]
pub struct ArchiveStatistics {
    /// Number of stored content records
    pub total_content: u64,

    /// Number of crawl sessions, finished or not
    pub total_sessions: u64,

    /// Content count per source id, largest first
    pub content_by_source: Vec<(String, u64)>,

    /// Most recent session of each source
    pub latest_sessions: Vec<CrawlSummary>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ArchiveStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> OutputResult<ArchiveStatistics> {
    let total_content = storage.count_content()?;
    let total_sessions = storage.count_sessions()?;

    let mut content_by_source = storage.count_by_source()?;
    content_by_source.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut latest_sessions = Vec::new();
    for source in storage.get_sources()? {
        let sessions = storage.get_sessions_by_source(&source)?;
        if let Some(latest) = sessions.iter().max_by_key(|s| s.id) {
            latest_sessions.push(CrawlSummary::from_session(latest)?);
        }
    }

    Ok(ArchiveStatistics {
        total_content,
        total_sessions,
        content_by_source,
        latest_sessions,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    println!("  Stored items: {}", stats.total_content);
    println!("  Crawl sessions: {}", stats.total_sessions);
    println!();

    if !stats.content_by_source.is_empty() {
        println!("Items by Source:");
        for (source, count) in &stats.content_by_source {
            let percentage = if stats.total_content > 0 {
                (*count as f64 / stats.total_content as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", source, count, percentage);
        }
        println!();
    }

    if !stats.latest_sessions.is_empty() {
        println!("Latest Sessions:");
        for session in &stats.latest_sessions {
            println!(
                "  {} #{}: {} processed, {} duplicates, stopped: {}",
                session.source_id,
                session.session_id,
                session.items_processed,
                session.duplicates_skipped,
                session
                    .stopped_reason
                    .map(|r| r.as_str())
                    .unwrap_or("running")
            );
        }
    }
}
