//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the per-source crawl loop that ties together:
//! - Session bookkeeping in the metadata store
//! - Listing extraction and pagination
//! - Concurrent detail enrichment
//! - Deduplicated persistence through the content and metadata stores
//! - Shutdown handling and the final summary

use crate::browser::{open_browser, Browser, BrowserPage};
use crate::config::{Config, CrawlerConfig, SourceConfig};
use crate::crawler::errors::{CrawlError, CrawlErrorManager, ErrorStage};
use crate::crawler::listing::extract_listing;
use crate::crawler::pagination::{AdvanceOutcome, CrawlTimings, PaginationController};
use crate::crawler::scheduler::{extract_concurrently, SchedulerOptions};
use crate::extract::parse_published_date;
use crate::output::CrawlSummary;
use crate::state::{CrawledItem, RunContext, StopReason};
use crate::storage::{CheckpointMode, ContentStore, SqliteStorage, Storage, StorageError};
use crate::url::parse_page_url;
use crate::Result;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Called with the items stored from each listing page
pub type PageCallback = Box<dyn FnMut(&[CrawledItem]) + Send>;

/// Per-run crawl options
pub struct CrawlOptions {
    /// Stop after this many listing pages
    pub max_pages: Option<u32>,
    /// Detail pages open at once
    pub content_concurrency: usize,
    /// Skip items whose URL is already stored
    pub skip_existing_urls: bool,
    /// Stop when every valid item of a page was already stored
    pub stop_on_all_duplicates: bool,
    pub on_page_complete: Option<PageCallback>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            content_concurrency: config.content_concurrency as usize,
            skip_existing_urls: config.skip_existing_urls,
            stop_on_all_duplicates: config.stop_on_all_duplicates,
            on_page_complete: None,
        }
    }

    pub fn with_page_callback(mut self, callback: impl FnMut(&[CrawledItem]) + Send + 'static) -> Self {
        self.on_page_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for CrawlOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlOptions")
            .field("max_pages", &self.max_pages)
            .field("content_concurrency", &self.content_concurrency)
            .field("skip_existing_urls", &self.skip_existing_urls)
            .field("stop_on_all_duplicates", &self.stop_on_all_duplicates)
            .field("on_page_complete", &self.on_page_complete.is_some())
            .finish()
    }
}

/// Result of [`Coordinator::run`]
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub summary: CrawlSummary,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    browser: Arc<dyn Browser>,
    storage: SqliteStorage,
    content_store: ContentStore,
    timings: CrawlTimings,
    checkpoint_interval: u32,
    shutdown: Arc<AtomicBool>,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a coordinator over explicit collaborators
    pub fn new(browser: Arc<dyn Browser>, storage: SqliteStorage, content_store: ContentStore) -> Self {
        Self {
            browser,
            storage,
            content_store,
            timings: CrawlTimings::default(),
            checkpoint_interval: CrawlerConfig::default().checkpoint_interval_pages,
            shutdown: Arc::new(AtomicBool::new(false)),
            config_hash: None,
        }
    }

    /// Creates a coordinator from a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `config_hash` - Hash of the configuration file, recorded per session
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Storage opened and page driver ready
    /// * `Err(HarvestError)` - Failed to initialize
    pub fn from_config(config: &Config, config_hash: Option<String>) -> Result<Self> {
        let timings = CrawlTimings::from_config(&config.crawler);
        let browser = open_browser(config, timings.page_load_timeout)?;
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let content_store = ContentStore::new(&config.output.content_dir);

        let mut coordinator = Self::new(browser, storage, content_store)
            .with_timings(timings)
            .with_checkpoint_interval(config.crawler.checkpoint_interval_pages);
        coordinator.config_hash = config_hash;
        Ok(coordinator)
    }

    pub fn with_timings(mut self, timings: CrawlTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_checkpoint_interval(mut self, pages: u32) -> Self {
        self.checkpoint_interval = pages.max(1);
        self
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Shares an externally owned shutdown flag
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag that stops the crawl at the next safe point once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content_store
    }

    /// Releases the storage, e.g. to close it with a final checkpoint
    pub fn into_storage(self) -> SqliteStorage {
        self.storage
    }

    /// Crawls one source from its listing URL until a stop condition
    ///
    /// The session is always ended, with stop reason `error` when the run
    /// aborts, before any error is returned.
    pub async fn run(&mut self, source: &SourceConfig, mut options: CrawlOptions) -> Result<CrawlResult> {
        info!("Starting crawl of '{}' at {}", source.id, source.listing_url);

        let mut ctx = RunContext::new(0, source, self.config_hash.clone());
        ctx.session_id = self
            .storage
            .create_session(&source.id, &source.name, &ctx.metadata)?;
        let errors = CrawlErrorManager::new(ctx.session_id);

        let outcome = match self.browser.new_page().await {
            Ok(page) => {
                let outcome = self
                    .walk_listing(page.as_ref(), source, &mut options, &mut ctx, &errors)
                    .await;
                if let Err(e) = page.close().await {
                    debug!("Closing listing page failed: {}", e);
                }
                outcome
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &outcome {
            error!("Crawl of '{}' aborted: {}", source.id, e);
            ctx.stop(StopReason::Error);
            let abort = CrawlError::untagged(format!("Crawl aborted: {}", e));
            match abort.stage {
                ErrorStage::Listing => ctx.metadata.listing_errors.push(abort.message),
                ErrorStage::Content => ctx.metadata.content_errors.push(abort.message),
            }
        }

        let ended_at = Utc::now();
        let ended = self.storage.end_session(ctx.session_id, &ctx.metadata);
        self.storage.checkpoint(CheckpointMode::Passive);
        outcome?;
        ended?;

        let summary = CrawlSummary::from_run(&ctx, ended_at);
        info!(
            "Finished '{}': {} pages, {} processed, {} duplicates, {} filtered, stopped: {}",
            source.id,
            summary.pages_processed,
            summary.items_processed,
            summary.duplicates_skipped,
            summary.total_filtered_items,
            summary
                .stopped_reason
                .map(|r| r.as_str())
                .unwrap_or("unknown")
        );

        Ok(CrawlResult { summary })
    }

    async fn walk_listing(
        &mut self,
        page: &dyn BrowserPage,
        source: &SourceConfig,
        options: &mut CrawlOptions,
        ctx: &mut RunContext,
        errors: &CrawlErrorManager,
    ) -> Result<()> {
        let listing_url = parse_page_url(&source.listing_url)?;

        if let Err(e) = page
            .goto(listing_url.as_str(), self.timings.page_load_timeout)
            .await
        {
            warn!("Listing page {} failed to load: {}", listing_url, e);
            errors.add_errors(
                &mut self.storage,
                &mut ctx.metadata,
                ErrorStage::Listing,
                vec![format!("Listing page {} failed to load: {}", listing_url, e)],
            )?;
            ctx.stop(StopReason::ContainerNotFound);
            return Ok(());
        }

        if let Err(e) = page
            .wait_for_selector(&source.container_selector, self.timings.container_timeout)
            .await
        {
            warn!("Listing container never appeared: {}", e);
            errors.add_errors(
                &mut self.storage,
                &mut ctx.metadata,
                ErrorStage::Listing,
                vec![format!(
                    "Container '{}' not found on {}: no extractable data",
                    source.container_selector, listing_url
                )],
            )?;
            ctx.stop(StopReason::ContainerNotFound);
            return Ok(());
        }

        let scheduler_options = SchedulerOptions {
            concurrency_limit: options.content_concurrency,
            skip_existing_urls: options.skip_existing_urls,
            container_timeout: self.timings.container_timeout,
            page_load_timeout: self.timings.page_load_timeout,
        };

        let mut page_number: u32 = 0;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested; stopping before the next listing page");
                ctx.stop(StopReason::ProcessInterrupted);
                break;
            }
            page_number += 1;

            let (html, page_url) = match read_listing_page(page).await {
                Ok(read) => read,
                Err(reason) => {
                    warn!("Listing page {} could not be read: {}", page_number, reason);
                    errors.add_errors(
                        &mut self.storage,
                        &mut ctx.metadata,
                        ErrorStage::Listing,
                        vec![format!(
                            "Listing page {} could not be read: {}",
                            page_number, reason
                        )],
                    )?;
                    ctx.stop(if page_number == 1 {
                        StopReason::ContainerNotFound
                    } else {
                        StopReason::PaginationFailed
                    });
                    break;
                }
            };
            debug!("Processing listing page {} ({})", page_number, page_url);

            let mut listing = extract_listing(&html, &page_url, source, ctx);
            errors.add_errors(
                &mut self.storage,
                &mut ctx.metadata,
                ErrorStage::Listing,
                std::mem::take(&mut listing.errors),
            )?;
            let valid = listing.valid();
            let mut items = listing.items;

            let report = extract_concurrently(
                self.browser.as_ref(),
                &self.storage,
                &mut items,
                source,
                &scheduler_options,
                &self.shutdown,
                ctx,
            )
            .await?;
            errors.record(&mut self.storage, &mut ctx.metadata, report.errors)?;
            ctx.metadata.content_warnings.extend(report.warnings);

            let mut duplicates = report.skipped_existing;
            let mut stored = Vec::with_capacity(items.len());
            for listing_item in items {
                match self.store_item(listing_item.item, ctx, errors)? {
                    Some(item) => stored.push(item),
                    None => duplicates += 1,
                }
            }

            ctx.metadata.pages_processed += 1;
            info!(
                "Page {}: {} found, {} stored, {} duplicates",
                page_number,
                listing.found,
                stored.len(),
                duplicates
            );

            if let Some(callback) = options.on_page_complete.as_mut() {
                callback(&stored);
            }

            self.storage.update_session(ctx.session_id, &ctx.metadata)?;
            if page_number % self.checkpoint_interval == 0 {
                self.storage.checkpoint(CheckpointMode::Passive);
            }

            if options.stop_on_all_duplicates && valid > 0 && duplicates == valid {
                info!("Every item on page {} was already stored", page_number);
                ctx.stop(StopReason::AllDuplicates);
                break;
            }

            if options.max_pages.is_some_and(|max| page_number >= max) {
                info!("Reached the page limit of {}", page_number);
                ctx.stop(StopReason::MaxPagesReached);
                break;
            }

            if self.shutdown.load(Ordering::SeqCst) {
                ctx.stop(StopReason::ProcessInterrupted);
                break;
            }

            match PaginationController::new(page, source, &self.timings)
                .advance()
                .await
            {
                AdvanceOutcome::Advanced { url } => debug!("Next listing page: {}", url),
                AdvanceOutcome::NotAdvanced(reason) => {
                    info!("Pagination ended: {:?}", reason);
                    ctx.stop(reason.stop_reason());
                    break;
                }
            }
        }

        Ok(())
    }

    /// Persists one item; `Ok(None)` when it was already stored
    fn store_item(
        &mut self,
        mut item: CrawledItem,
        ctx: &mut RunContext,
        errors: &CrawlErrorManager,
    ) -> Result<Option<CrawledItem>> {
        let mut had_error = ctx.had_content_error(&item.url);

        if let Some(raw) = item.published_date.take() {
            match parse_published_date(&raw) {
                Ok(date) => item.published_date = Some(date),
                Err(e) => {
                    had_error = true;
                    item.metadata.insert("raw_published_date".to_string(), raw);
                    errors.add_errors(
                        &mut self.storage,
                        &mut ctx.metadata,
                        ErrorStage::Content,
                        vec![format!("Content parsing failed for {}: {}", item.url, e)],
                    )?;
                }
            }
        }

        let blob = self.content_store.store(&item)?;
        if blob.existed {
            if self.storage.url_exists(&item.url)? {
                debug!("Already stored: {}", item.url);
                ctx.metadata.duplicates_skipped += 1;
                return Ok(None);
            }
            warn!("Content blob for {} has no metadata row; restoring it", item.url);
        }

        let content_id = match self.storage.store_content(&item, &blob.hash) {
            Ok(id) => id,
            Err(StorageError::DuplicateUrl(url)) => {
                ctx.metadata.duplicates_skipped += 1;
                ctx.metadata
                    .content_warnings
                    .push(format!("Duplicate URL skipped: {}", url));
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        self.storage
            .link_content_to_session(ctx.session_id, content_id, had_error)?;
        ctx.metadata.items_processed += 1;
        if had_error {
            ctx.metadata.items_with_errors += 1;
        }

        Ok(Some(item))
    }
}

/// Snapshot and URL of the listing page currently loaded
async fn read_listing_page(page: &dyn BrowserPage) -> std::result::Result<(String, Url), String> {
    let html = page.content().await.map_err(|e| e.to_string())?;
    let current = page.current_url().await.map_err(|e| e.to_string())?;
    let page_url = parse_page_url(&current).map_err(|e| e.to_string())?;
    Ok((html, page_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakeDocument, FakeSite};
    use crate::config::{FieldAttribute, FieldConfig, PaginationConfig};
    use crate::storage::content_hash;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn source() -> SourceConfig {
        let mut listing_fields = BTreeMap::new();
        listing_fields.insert("title".to_string(), FieldConfig::text("h2"));
        listing_fields.insert(
            "url".to_string(),
            FieldConfig::text("a").with_attribute(FieldAttribute::Href),
        );
        listing_fields.insert("date".to_string(), FieldConfig::text("time").optional());
        SourceConfig {
            id: "news".to_string(),
            name: "News".to_string(),
            listing_url: "https://fake.test/p1".to_string(),
            container_selector: "li".to_string(),
            listing_fields,
            pagination: Some(PaginationConfig {
                next_button_selector: "a.next".to_string(),
                delay_seconds: 0.0,
            }),
            detail_container_selector: None,
            detail_fields: BTreeMap::new(),
        }
    }

    fn listing(page: usize, ids: &[usize], last: bool) -> FakeDocument {
        let items: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"<li><h2>Story {id}</h2><a href="/a/{id}">read</a><time>July {id}, 2025</time></li>"#
                )
            })
            .collect();
        let next = if last {
            String::new()
        } else {
            format!(r#"<a class="next" href="/p{}">Next</a>"#, page + 1)
        };
        FakeDocument::new(
            &format!("https://fake.test/p{}", page),
            &format!("<ul>{}</ul>{}", items, next),
        )
    }

    fn coordinator(site: FakeSite, dir: &TempDir) -> (Coordinator, FakeBrowser) {
        let browser = FakeBrowser::new(site);
        let coordinator = Coordinator::new(
            Arc::new(browser.clone()),
            SqliteStorage::new_in_memory().unwrap(),
            ContentStore::new(dir.path()),
        )
        .with_timings(CrawlTimings::immediate());
        (coordinator, browser)
    }

    fn two_pages() -> FakeSite {
        FakeSite::with_listing(vec![listing(1, &[1, 2], false), listing(2, &[3], true)])
    }

    #[tokio::test]
    async fn test_two_page_run() {
        let dir = TempDir::new().unwrap();
        let (mut coordinator, browser) = coordinator(two_pages(), &dir);

        let pages = Arc::new(Mutex::new(Vec::new()));
        let seen = pages.clone();
        let options = CrawlOptions::default().with_page_callback(move |items| {
            seen.lock().unwrap().push(items.len());
        });

        let summary = coordinator.run(&source(), options).await.unwrap().summary;

        assert_eq!(summary.pages_processed, 2);
        assert_eq!(summary.items_found, 3);
        assert_eq!(summary.items_processed, 3);
        assert_eq!(summary.stopped_reason, Some(StopReason::NoNextButton));
        assert!(summary.is_balanced());
        assert_eq!(*pages.lock().unwrap(), vec![2, 1]);
        assert_eq!(browser.site.closed.load(Ordering::SeqCst), 1);

        let storage = coordinator.storage();
        let session = storage.get_session(summary.session_id).unwrap().unwrap();
        assert!(!session.is_active());
        assert_eq!(session.metadata.items_processed, 3);

        let links = storage.get_session_content(summary.session_id).unwrap();
        let orders: Vec<i64> = links.iter().map(|l| l.processed_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);

        let record = storage
            .get_by_hash(&content_hash("https://fake.test/a/1"))
            .unwrap()
            .unwrap();
        assert_eq!(
            record.published_date.as_deref(),
            Some("2025-07-01T00:00:00.000Z")
        );
        assert!(coordinator.content_store().exists("https://fake.test/a/3"));
    }

    #[tokio::test]
    async fn test_max_pages() {
        let dir = TempDir::new().unwrap();
        let (mut coordinator, _) = coordinator(two_pages(), &dir);
        let options = CrawlOptions {
            max_pages: Some(1),
            ..CrawlOptions::default()
        };

        let summary = coordinator.run(&source(), options).await.unwrap().summary;
        assert_eq!(summary.pages_processed, 1);
        assert_eq!(summary.stopped_reason, Some(StopReason::MaxPagesReached));
    }

    #[tokio::test]
    async fn test_second_run_stops_on_duplicates() {
        let dir = TempDir::new().unwrap();
        let (mut coordinator, _) = coordinator(two_pages(), &dir);
        coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap();

        let summary = coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap()
            .summary;
        assert_eq!(summary.pages_processed, 1);
        assert_eq!(summary.duplicates_skipped, 2);
        assert_eq!(summary.items_processed, 0);
        assert_eq!(summary.stopped_reason, Some(StopReason::AllDuplicates));
        assert!(summary.is_balanced());
    }

    #[tokio::test]
    async fn test_duplicates_detected_at_store_time() {
        let dir = TempDir::new().unwrap();
        let (mut coordinator, _) = coordinator(two_pages(), &dir);
        coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap();

        let options = CrawlOptions {
            skip_existing_urls: false,
            stop_on_all_duplicates: false,
            ..CrawlOptions::default()
        };
        let summary = coordinator.run(&source(), options).await.unwrap().summary;
        assert_eq!(summary.pages_processed, 2);
        assert_eq!(summary.duplicates_skipped, 3);
        assert!(summary.is_balanced());
    }

    #[tokio::test]
    async fn test_missing_container() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::with_listing(vec![FakeDocument::new(
            "https://fake.test/p1",
            "<p>Maintenance</p>",
        )]);
        let (mut coordinator, _) = coordinator(site, &dir);

        let summary = coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap()
            .summary;
        assert_eq!(summary.stopped_reason, Some(StopReason::ContainerNotFound));
        assert_eq!(summary.pages_processed, 0);
        assert_eq!(summary.listing_errors.len(), 1);
        assert!(!coordinator
            .storage()
            .is_session_active(summary.session_id)
            .unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_before_first_page() {
        let dir = TempDir::new().unwrap();
        let (coordinator, _) = coordinator(two_pages(), &dir);
        let mut coordinator = coordinator.with_shutdown(Arc::new(AtomicBool::new(true)));

        let summary = coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap()
            .summary;
        assert_eq!(summary.stopped_reason, Some(StopReason::ProcessInterrupted));
        assert_eq!(summary.pages_processed, 0);
        assert!(summary.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_unparsable_date_is_a_content_error() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::with_listing(vec![FakeDocument::new(
            "https://fake.test/p1",
            r#"<ul><li><h2>Odd</h2><a href="/a/9">read</a><time>sometime soon</time></li></ul>"#,
        )]);
        let (mut coordinator, _) = coordinator(site, &dir);

        let summary = coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap()
            .summary;
        assert_eq!(summary.items_processed, 1);
        assert_eq!(summary.items_with_errors, 1);
        assert_eq!(summary.content_errors.len(), 1);
        assert!(summary.content_errors[0].starts_with("Content parsing failed"));

        let stored = coordinator
            .content_store()
            .retrieve("https://fake.test/a/9")
            .unwrap()
            .unwrap();
        assert_eq!(stored.published_date, None);
        assert_eq!(
            stored.metadata.get("raw_published_date").map(String::as_str),
            Some("sometime soon")
        );
    }

    #[tokio::test]
    async fn test_blob_without_row_is_restored() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::with_listing(vec![listing(1, &[1], true)]);
        let (mut coordinator, _) = coordinator(site, &dir);

        let mut orphan = CrawledItem::new("news");
        orphan.url = "https://fake.test/a/1".to_string();
        orphan.title = "Story 1".to_string();
        coordinator.content_store().store(&orphan).unwrap();

        let summary = coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap()
            .summary;
        assert_eq!(summary.items_processed, 1);
        assert_eq!(summary.duplicates_skipped, 0);
        assert!(coordinator
            .storage()
            .url_exists("https://fake.test/a/1")
            .unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_listing_page_ends_run_with_summary() {
        let dir = TempDir::new().unwrap();
        let mut site = two_pages();
        site.unreadable_listing = Some(1);
        let (mut coordinator, browser) = coordinator(site, &dir);

        let summary = coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap()
            .summary;

        assert_eq!(summary.pages_processed, 1);
        assert_eq!(summary.items_processed, 2);
        assert_eq!(summary.stopped_reason, Some(StopReason::PaginationFailed));
        assert_eq!(summary.listing_errors.len(), 1);
        assert!(summary.listing_errors[0].contains("could not be read"));
        assert_eq!(browser.site.closed.load(Ordering::SeqCst), 1);
        assert!(!coordinator
            .storage()
            .is_session_active(summary.session_id)
            .unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_first_listing_page() {
        let dir = TempDir::new().unwrap();
        let mut site = two_pages();
        site.unreadable_listing = Some(0);
        let (mut coordinator, _) = coordinator(site, &dir);

        let summary = coordinator
            .run(&source(), CrawlOptions::default())
            .await
            .unwrap()
            .summary;

        assert_eq!(summary.pages_processed, 0);
        assert_eq!(summary.stopped_reason, Some(StopReason::ContainerNotFound));
        assert_eq!(summary.listing_errors.len(), 1);
    }
}

