//! Concurrent detail-page extraction
//!
//! Visits each listing item's own URL on a bounded pool of browser pages and
//! merges the detail fields back into the items. Pages are opened once per
//! listing page, reused across items, and always closed before returning.

use crate::browser::{Browser, BrowserPage};
use crate::config::SourceConfig;
use crate::crawler::errors::CrawlError;
use crate::crawler::listing::ListingItem;
use crate::extract::{extract_first, FieldExtraction};
use crate::state::RunContext;
use crate::storage::{Storage, StorageResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use url::Url;

/// Completions between progress log lines
const PROGRESS_EVERY: usize = 5;

/// Knobs for one scheduling round
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Maximum number of detail pages open at once
    pub concurrency_limit: usize,
    /// Drop items whose URL is already stored before visiting anything
    pub skip_existing_urls: bool,
    pub container_timeout: Duration,
    pub page_load_timeout: Duration,
}

/// What happened during one scheduling round
#[derive(Debug, Default)]
pub struct SchedulerReport {
    /// Items dropped because their URL was already stored
    pub skipped_existing: usize,
    /// Detail visits started
    pub attempted: usize,
    /// Detail visits that failed outright
    pub failed: usize,
    /// Items dropped because shutdown arrived before their visit started
    pub not_started: usize,
    /// Browser pages opened
    pub pool_size: usize,
    pub errors: Vec<CrawlError>,
    pub warnings: Vec<String>,
}

/// Reusable browser pages handed out one task at a time
struct PagePool {
    pages: Vec<Arc<dyn BrowserPage>>,
    available: VecDeque<usize>,
}

impl PagePool {
    async fn open(browser: &dyn Browser, size: usize) -> Self {
        let mut pages = Vec::with_capacity(size);
        for _ in 0..size {
            match browser.new_page().await {
                Ok(page) => pages.push(page),
                Err(e) => warn!("Failed to open detail page: {}", e),
            }
        }
        let available = (0..pages.len()).collect();
        Self { pages, available }
    }

    fn len(&self) -> usize {
        self.pages.len()
    }

    fn acquire(&mut self) -> Option<(usize, Arc<dyn BrowserPage>)> {
        let slot = self.available.pop_front()?;
        Some((slot, self.pages[slot].clone()))
    }

    fn release(&mut self, slot: usize) {
        self.available.push_back(slot);
    }

    async fn close_all(self) {
        for page in self.pages {
            if let Err(e) = page.close().await {
                debug!("Closing detail page failed: {}", e);
            }
        }
    }
}

/// Enriches listing items with their detail fields
///
/// # Arguments
///
/// * `browser` - Opens the pool's pages
/// * `storage` - Consulted for already-stored URLs
/// * `items` - Listing items; skipped and unstarted items are removed in place
/// * `source` - Detail container and field rules
/// * `options` - Pool size, timeouts and duplicate skipping
/// * `shutdown` - When set, no further visits start
/// * `ctx` - Run accumulators receiving counters and content field stats
///
/// # Returns
///
/// A report of the round; only the duplicate lookup can fail the call.
pub async fn extract_concurrently(
    browser: &dyn Browser,
    storage: &dyn Storage,
    items: &mut Vec<ListingItem>,
    source: &SourceConfig,
    options: &SchedulerOptions,
    shutdown: &AtomicBool,
    ctx: &mut RunContext,
) -> StorageResult<SchedulerReport> {
    let mut report = SchedulerReport::default();

    if options.skip_existing_urls && !items.is_empty() {
        let urls: Vec<String> = items.iter().map(|i| i.item.url.clone()).collect();
        let existing = storage.get_existing_urls(&urls)?;
        if !existing.is_empty() {
            items.retain(|i| !existing.contains(&i.item.url));
            report.skipped_existing = urls.len() - items.len();
            ctx.metadata.duplicates_skipped += report.skipped_existing as u64;
            debug!("Skipping {} already stored item(s)", report.skipped_existing);
        }
    }

    if !source.has_detail_fields() || items.is_empty() {
        return Ok(report);
    }

    let size = options.concurrency_limit.max(1).min(items.len());
    let mut pool = PagePool::open(browser, size).await;
    report.pool_size = pool.len();

    let results: Vec<VisitOutcome> = if pool.len() == 0 {
        error!("No detail pages could be opened");
        (0..items.len())
            .map(|_| Some(Err("no browser page available".to_string())))
            .collect()
    } else {
        run_visits(&mut pool, items, source, options, shutdown, &mut report).await
    };

    pool.close_all().await;

    let mut unstarted = HashSet::new();
    for (pos, result) in results.into_iter().enumerate() {
        let listing = &mut items[pos];
        match result {
            Some(Ok(extraction)) => merge_detail(listing, &extraction, source, ctx, &mut report),
            Some(Err(reason)) => {
                report.failed += 1;
                record_failure(listing, &reason, source, ctx, &mut report);
            }
            None => {
                unstarted.insert(pos);
            }
        }
    }

    if !unstarted.is_empty() {
        report.not_started = unstarted.len();
        ctx.metadata.total_filtered_items += unstarted.len() as u64;
        report.warnings.push(format!(
            "Shutdown requested: {} item(s) left without detail extraction",
            unstarted.len()
        ));
        let mut pos = 0;
        items.retain(|_| {
            let keep = !unstarted.contains(&pos);
            pos += 1;
            keep
        });
    }

    Ok(report)
}

type VisitOutcome = Option<Result<FieldExtraction, String>>;

/// Pool slot and item position of each running visit
type Launched = HashMap<task::Id, (usize, usize)>;

async fn run_visits(
    pool: &mut PagePool,
    items: &[ListingItem],
    source: &SourceConfig,
    options: &SchedulerOptions,
    shutdown: &AtomicBool,
    report: &mut SchedulerReport,
) -> Vec<VisitOutcome> {
    let source = Arc::new(source.clone());
    let mut results: Vec<VisitOutcome> = (0..items.len()).map(|_| None).collect();
    let mut pending: VecDeque<usize> = (0..items.len()).collect();
    let mut launched = Launched::new();
    let mut tasks = JoinSet::new();
    let mut completed = 0;

    loop {
        while !shutdown.load(Ordering::SeqCst) && !pending.is_empty() {
            let Some((slot, page)) = pool.acquire() else {
                break;
            };
            let Some(pos) = pending.pop_front() else {
                pool.release(slot);
                break;
            };

            report.attempted += 1;
            let url = items[pos].item.url.clone();
            let source = source.clone();
            let container_timeout = options.container_timeout;
            let page_load_timeout = options.page_load_timeout;

            let handle = tasks.spawn(async move {
                let visit = tokio::spawn(visit_detail(
                    page,
                    url,
                    source,
                    page_load_timeout,
                    container_timeout,
                ));
                match visit.await {
                    Ok(result) => result,
                    Err(e) => Err(format!("detail task aborted: {}", e)),
                }
            });
            launched.insert(handle.id(), (slot, pos));
        }

        let Some(joined) = tasks.join_next_with_id().await else {
            break;
        };

        if settle(joined, &mut launched, pool, &mut results) {
            completed += 1;
            if completed % PROGRESS_EVERY == 0 {
                info!("Detail progress: {}/{}", completed, items.len());
            }
        }
    }

    results
}

/// Frees the finished visit's slot and stores its outcome
fn settle(
    joined: Result<(task::Id, Result<FieldExtraction, String>), JoinError>,
    launched: &mut Launched,
    pool: &mut PagePool,
    results: &mut [VisitOutcome],
) -> bool {
    let (id, result) = match joined {
        Ok((id, result)) => (id, result),
        Err(e) => {
            error!("Detail worker failed: {}", e);
            (e.id(), Err(format!("detail worker failed: {}", e)))
        }
    };

    let Some((slot, pos)) = launched.remove(&id) else {
        return false;
    };
    pool.release(slot);
    results[pos] = Some(result);
    true
}

async fn visit_detail(
    page: Arc<dyn BrowserPage>,
    url: String,
    source: Arc<SourceConfig>,
    page_load_timeout: Duration,
    container_timeout: Duration,
) -> Result<FieldExtraction, String> {
    page.goto(&url, page_load_timeout)
        .await
        .map_err(|e| e.to_string())?;

    let container = source.detail_container();
    if let Err(e) = page.wait_for_selector(container, container_timeout).await {
        debug!("Detail container '{}' not ready on {}: {}", container, url, e);
    }

    let html = page.content().await.map_err(|e| e.to_string())?;
    let current = page.current_url().await.map_err(|e| e.to_string())?;
    let page_url = Url::parse(&current)
        .or_else(|_| Url::parse(&url))
        .map_err(|e| e.to_string())?;

    Ok(extract_first(&html, &page_url, container, &source.detail_fields))
}

fn merge_detail(
    listing: &mut ListingItem,
    extraction: &FieldExtraction,
    source: &SourceConfig,
    ctx: &mut RunContext,
    report: &mut SchedulerReport,
) {
    // No values at all means the detail container never matched.
    if extraction.values.is_empty() {
        report.failed += 1;
        let reason = if extraction.errors.is_empty() {
            "detail container not found".to_string()
        } else {
            extraction.errors.join("; ")
        };
        record_failure(listing, &reason, source, ctx, report);
        return;
    }

    let url = listing.item.url.clone();
    let fallback = listing.item.has_content();
    let mut failed = false;
    for (name, field) in &source.detail_fields {
        let found = extraction.found(name);
        ctx.metadata
            .content_field_stats
            .record(name, listing.index, found);
        if found {
            continue;
        }

        let message = format!(
            "Content page {}: {} field '{}' not found (selector: '{}')",
            url,
            if field.optional { "optional" } else { "required" },
            name,
            field.selector
        );
        if field.optional {
            report.warnings.push(message);
            continue;
        }
        failed = true;
        if fallback {
            report.warnings.push(message);
        } else {
            report.errors.push(CrawlError::content(message));
        }
    }

    if failed {
        ctx.mark_content_failed(&url);
    }
    listing.item.apply_fields(&extraction.values);
}

fn record_failure(
    listing: &mut ListingItem,
    reason: &str,
    source: &SourceConfig,
    ctx: &mut RunContext,
    report: &mut SchedulerReport,
) {
    for name in source.detail_fields.keys() {
        ctx.metadata
            .content_field_stats
            .record(name, listing.index, false);
    }

    let message = format!("Content page {} failed: {}", listing.item.url, reason);
    warn!("{}", message);
    if listing.item.has_content() {
        report.warnings.push(message);
    } else {
        report.errors.push(CrawlError::content(message));
    }
    ctx.mark_content_failed(&listing.item.url);
}
