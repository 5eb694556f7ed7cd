//! Scripted in-memory browser for engine tests

use crate::browser::dom::{find_element_state, has_element};
use crate::browser::{Browser, BrowserError, BrowserPage, BrowserResult, ElementState};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a click on the next button does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickEffect {
    /// Moves to the next scripted listing page
    Advance,
    /// Nothing happens; the URL stays the same
    Stall,
    /// Navigates to a new URL whose document lacks the listing container
    Blank,
    /// Swaps in the next listing page and its URL without a navigation event
    InPlace,
}

/// One scripted listing document
#[derive(Debug, Clone)]
pub struct FakeDocument {
    pub url: String,
    pub html: String,
}

impl FakeDocument {
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            url: url.to_string(),
            html: html.to_string(),
        }
    }
}

/// Shared script and counters for every page the browser opens
#[derive(Default)]
pub struct FakeSite {
    pub listing: Vec<FakeDocument>,
    /// Detail URL to document; a missing entry fails navigation
    pub details: HashMap<String, String>,
    pub clicks: Mutex<VecDeque<ClickEffect>>,
    pub detail_delay: Duration,
    /// Detail URLs whose navigation panics
    pub panic_on: HashSet<String>,
    /// Listing page index whose serialized content cannot be read
    pub unreadable_listing: Option<usize>,

    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub click_count: AtomicUsize,
    pub reload_count: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub detail_visits: AtomicUsize,
}

impl FakeSite {
    pub fn with_listing(listing: Vec<FakeDocument>) -> Self {
        Self {
            listing,
            ..Self::default()
        }
    }

    pub fn script_clicks(&self, effects: &[ClickEffect]) {
        if let Ok(mut clicks) = self.clicks.lock() {
            clicks.extend(effects.iter().copied());
        }
    }

    fn next_click(&self) -> ClickEffect {
        self.clicks
            .lock()
            .ok()
            .and_then(|mut clicks| clicks.pop_front())
            .unwrap_or(ClickEffect::Advance)
    }
}

#[derive(Clone)]
pub struct FakeBrowser {
    pub site: Arc<FakeSite>,
}

impl FakeBrowser {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_page(&self) -> BrowserResult<Arc<dyn BrowserPage>> {
        self.site.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakePage::new(self.site.clone())))
    }
}

#[derive(Debug, Default)]
struct PageState {
    listing_index: Option<usize>,
    current: Option<FakeDocument>,
    navigated: bool,
    closed: bool,
}

pub struct FakePage {
    site: Arc<FakeSite>,
    state: Mutex<PageState>,
}

impl FakePage {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self {
            site,
            state: Mutex::new(PageState::default()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PageState) -> BrowserResult<T>) -> BrowserResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BrowserError::Navigation("poisoned".to_string()))?;
        if state.closed {
            return Err(BrowserError::Closed);
        }
        f(&mut state)
    }

    fn html(&self) -> BrowserResult<String> {
        self.with_state(|s| Ok(s.current.as_ref().map(|d| d.html.clone()).unwrap_or_default()))
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.with_state(|_| Ok(()))?;

        if let Some(index) = self.site.listing.iter().position(|d| d.url == url) {
            let doc = self.site.listing[index].clone();
            return self.with_state(|s| {
                s.listing_index = Some(index);
                s.current = Some(doc);
                Ok(())
            });
        }

        self.site.detail_visits.fetch_add(1, Ordering::SeqCst);
        if self.site.panic_on.contains(url) {
            panic!("renderer crashed on {}", url);
        }
        let now = self.site.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.site.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.site.detail_delay).await;
        self.site.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.site.details.get(url) {
            Some(html) => {
                let doc = FakeDocument::new(url, html);
                self.with_state(|s| {
                    s.current = Some(doc);
                    Ok(())
                })
            }
            None => Err(BrowserError::HttpStatus {
                status: 500,
                url: url.to_string(),
            }),
        }
    }

    async fn current_url(&self) -> BrowserResult<String> {
        self.with_state(|s| {
            Ok(s.current
                .as_ref()
                .map(|d| d.url.clone())
                .unwrap_or_else(|| "about:blank".to_string()))
        })
    }

    async fn content(&self) -> BrowserResult<String> {
        let unreadable = self.site.unreadable_listing;
        self.with_state(|s| {
            if unreadable.is_some() && s.listing_index == unreadable {
                return Err(BrowserError::Navigation("target crashed".to_string()));
            }
            Ok(())
        })?;
        self.html()
    }

    async fn element_state(&self, selector: &str) -> BrowserResult<Option<ElementState>> {
        find_element_state(&self.html()?, selector)
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        if !has_element(&self.html()?, selector)? {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        self.site.click_count.fetch_add(1, Ordering::SeqCst);

        let effect = self.site.next_click();
        let listing = &self.site.listing;
        self.with_state(|s| {
            match effect {
                ClickEffect::Advance => {
                    let next = s.listing_index.map(|i| i + 1).unwrap_or(0);
                    if let Some(doc) = listing.get(next) {
                        s.listing_index = Some(next);
                        s.current = Some(doc.clone());
                        s.navigated = true;
                    }
                }
                ClickEffect::Stall => {}
                ClickEffect::InPlace => {
                    let next = s.listing_index.map(|i| i + 1).unwrap_or(0);
                    if let Some(doc) = listing.get(next) {
                        s.listing_index = Some(next);
                        s.current = Some(doc.clone());
                    }
                }
                ClickEffect::Blank => {
                    s.current = Some(FakeDocument::new(
                        "https://fake.test/blank",
                        "<html><body></body></html>",
                    ));
                    s.navigated = true;
                }
            }
            Ok(())
        })
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> BrowserResult<()> {
        self.with_state(|s| {
            if std::mem::take(&mut s.navigated) {
                Ok(())
            } else {
                Err(BrowserError::Timeout("navigation".to_string()))
            }
        })
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> BrowserResult<()> {
        if has_element(&self.html()?, selector)? {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!("selector '{}'", selector)))
        }
    }

    async fn reload(&self, _timeout: Duration) -> BrowserResult<()> {
        self.site.reload_count.fetch_add(1, Ordering::SeqCst);
        let listing = &self.site.listing;
        self.with_state(|s| {
            if let Some(doc) = s.listing_index.and_then(|i| listing.get(i)) {
                s.current = Some(doc.clone());
            }
            Ok(())
        })
    }

    async fn close(&self) -> BrowserResult<()> {
        self.site.closed.fetch_add(1, Ordering::SeqCst);
        let mut state = self
            .state
            .lock()
            .map_err(|_| BrowserError::Navigation("poisoned".to_string()))?;
        state.closed = true;
        Ok(())
    }
}
