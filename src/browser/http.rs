//! Static HTTP page driver
//!
//! Loads documents with `reqwest` and answers DOM questions from the fetched
//! HTML. There is no script execution: a click follows the element's
//! `href`/`data-href`, navigation waits resolve immediately, and selector
//! waits check the current snapshot.

use crate::browser::dom::{find_element_state, has_element, link_target};
use crate::browser::{Browser, BrowserError, BrowserPage, BrowserResult, ElementState};
use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

/// Builds an HTTP client identifying the harvester
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout applied when a call sets none
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Browser backed by a shared HTTP client
#[derive(Clone)]
pub struct HttpBrowser {
    client: Client,
    page_load_timeout: Duration,
}

impl HttpBrowser {
    pub fn new(config: &UserAgentConfig, page_load_timeout: Duration) -> BrowserResult<Self> {
        let client = build_http_client(config, page_load_timeout)?;
        Ok(Self::with_client(client, page_load_timeout))
    }

    pub fn with_client(client: Client, page_load_timeout: Duration) -> Self {
        Self {
            client,
            page_load_timeout,
        }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self) -> BrowserResult<Arc<dyn BrowserPage>> {
        Ok(Arc::new(HttpPage::new(
            self.client.clone(),
            self.page_load_timeout,
        )))
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    url: Option<Url>,
    html: String,
    /// Set by a click that loaded a new document, consumed by the next navigation wait
    navigated: bool,
    closed: bool,
}

/// One page of an [`HttpBrowser`]
pub struct HttpPage {
    client: Client,
    page_load_timeout: Duration,
    snapshot: Mutex<Snapshot>,
}

impl HttpPage {
    fn new(client: Client, page_load_timeout: Duration) -> Self {
        Self {
            client,
            page_load_timeout,
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    async fn load(&self, url: &str, timeout: Duration) -> BrowserResult<(Url, String)> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = response.status();
        let final_url = response.url().clone();
        if !status.is_success() {
            return Err(BrowserError::HttpStatus {
                status: status.as_u16(),
                url: final_url.to_string(),
            });
        }

        let body = response.text().await.map_err(|e| classify(e, url))?;
        trace!("Loaded {} ({} bytes)", final_url, body.len());
        Ok((final_url, body))
    }

    async fn open_snapshot(&self) -> BrowserResult<tokio::sync::MutexGuard<'_, Snapshot>> {
        let snapshot = self.snapshot.lock().await;
        if snapshot.closed {
            return Err(BrowserError::Closed);
        }
        Ok(snapshot)
    }
}

fn classify(error: reqwest::Error, url: &str) -> BrowserError {
    if error.is_timeout() {
        BrowserError::Timeout(format!("load of {}", url))
    } else if error.is_connect() || error.is_request() || error.is_builder() {
        BrowserError::Navigation(format!("{}: {}", url, error))
    } else {
        BrowserError::Http(error)
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.open_snapshot().await?;
        let (final_url, html) = self.load(url, timeout).await?;

        let mut snapshot = self.open_snapshot().await?;
        snapshot.url = Some(final_url);
        snapshot.html = html;
        Ok(())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let snapshot = self.open_snapshot().await?;
        Ok(snapshot
            .url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn content(&self) -> BrowserResult<String> {
        let snapshot = self.open_snapshot().await?;
        Ok(snapshot.html.clone())
    }

    async fn element_state(&self, selector: &str) -> BrowserResult<Option<ElementState>> {
        let snapshot = self.open_snapshot().await?;
        find_element_state(&snapshot.html, selector)
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        let target = {
            let snapshot = self.open_snapshot().await?;
            let Some(href) = link_target(&snapshot.html, selector)? else {
                debug!("Element '{}' has no link target; click is a no-op", selector);
                return Ok(());
            };
            let base = snapshot
                .url
                .clone()
                .ok_or_else(|| BrowserError::Navigation("click on a blank page".to_string()))?;
            crate::url::resolve_url(&base, &href)
                .map_err(|e| BrowserError::Navigation(format!("{}: {}", href, e)))?
        };

        let (final_url, html) = self.load(target.as_str(), self.page_load_timeout).await?;

        let mut snapshot = self.open_snapshot().await?;
        snapshot.url = Some(final_url);
        snapshot.html = html;
        snapshot.navigated = true;
        Ok(())
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> BrowserResult<()> {
        let mut snapshot = self.open_snapshot().await?;
        if std::mem::take(&mut snapshot.navigated) {
            Ok(())
        } else {
            Err(BrowserError::Timeout("navigation".to_string()))
        }
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> BrowserResult<()> {
        let snapshot = self.open_snapshot().await?;
        if has_element(&snapshot.html, selector)? {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!("selector '{}'", selector)))
        }
    }

    async fn reload(&self, timeout: Duration) -> BrowserResult<()> {
        let url = {
            let snapshot = self.open_snapshot().await?;
            snapshot
                .url
                .clone()
                .ok_or_else(|| BrowserError::Navigation("reload of a blank page".to_string()))?
        };
        self.goto(url.as_str(), timeout).await
    }

    async fn close(&self) -> BrowserResult<()> {
        let mut snapshot = self.snapshot.lock().await;
        snapshot.closed = true;
        snapshot.html.clear();
        Ok(())
    }
}
