//! Browser seam driven by the crawl engine
//!
//! The engine never talks to a concrete browser. It opens pages through
//! [`Browser`], drives them through [`BrowserPage`], and closes every page it
//! opened. [`http::HttpBrowser`] implements the seam for server-rendered
//! sites with `reqwest` and `scraper`; with the `browser` feature,
//! `chromium::ChromiumBrowser` drives headless Chromium for script-rendered
//! sites.

#[cfg(feature = "browser")]
pub mod chromium;
mod dom;
pub mod http;

#[cfg(test)]
pub(crate) mod fake;

use crate::config::{BrowserEngine, Config};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use dom::{find_element_state, has_element, ElementState};
pub use http::{build_http_client, HttpBrowser, HttpPage};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumBrowser, ChromiumOptions, ChromiumPage};

/// Errors raised while driving a page
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Page is closed")]
    Closed,

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "browser")]
    #[error("DevTools error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

impl BrowserError {
    /// Returns true for waits that ran out of time
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            #[cfg(feature = "browser")]
            Self::Cdp(chromiumoxide::error::CdpError::Timeout) => true,
            _ => false,
        }
    }
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// One open page (tab)
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigates to `url` and waits for the load to finish
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()>;

    /// URL of the currently loaded document
    async fn current_url(&self) -> BrowserResult<String>;

    /// Serialized HTML of the current document
    async fn content(&self) -> BrowserResult<String>;

    /// Visibility and disabled flags of the first element matching `selector`
    async fn element_state(&self, selector: &str) -> BrowserResult<Option<ElementState>>;

    /// Clicks the first element matching `selector`
    async fn click(&self, selector: &str) -> BrowserResult<()>;

    /// Waits for a navigation started by the last action
    async fn wait_for_navigation(&self, timeout: Duration) -> BrowserResult<()>;

    /// Waits until an element matching `selector` exists
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()>;

    /// Reloads the current document
    async fn reload(&self, timeout: Duration) -> BrowserResult<()>;

    /// Releases the page; further calls fail with [`BrowserError::Closed`]
    async fn close(&self) -> BrowserResult<()>;
}

/// Factory for pages
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> BrowserResult<Arc<dyn BrowserPage>>;
}

/// Opens the page driver selected by `crawler.browser-engine`
pub fn open_browser(config: &Config, page_load_timeout: Duration) -> BrowserResult<Arc<dyn Browser>> {
    match config.crawler.browser_engine {
        BrowserEngine::Http => Ok(Arc::new(HttpBrowser::new(
            &config.user_agent,
            page_load_timeout,
        )?)),
        #[cfg(feature = "browser")]
        BrowserEngine::Chromium => Ok(Arc::new(ChromiumBrowser::new(
            ChromiumOptions::from_config(config),
        ))),
        #[cfg(not(feature = "browser"))]
        BrowserEngine::Chromium => Err(BrowserError::Launch(
            "built without the `browser` feature".to_string(),
        )),
    }
}

