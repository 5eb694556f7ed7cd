//! Headless Chromium page driver
//!
//! Drives real browser tabs over the DevTools protocol, so listings that
//! re-render in place after a click (no navigation event, URL updated by the
//! page's own scripts) advance the same way link-based pagination does.
//! Chromium is launched lazily on the first page request.

use crate::browser::{Browser, BrowserError, BrowserPage, BrowserResult, ElementState};
use crate::config::Config;
use async_trait::async_trait;
use chromiumoxide::{Browser as CdpBrowser, BrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, info};

/// Gap between DOM polls while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Common Chromium install locations
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/google-chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Launch settings for [`ChromiumBrowser`]
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_agent: String,
}

impl ChromiumOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            headless: config.crawler.headless,
            executable: config.crawler.chrome_executable.as_ref().map(PathBuf::from),
            user_agent: config.user_agent.header_value(),
        }
    }
}

/// Browser backed by one shared Chromium process
pub struct ChromiumBrowser {
    options: ChromiumOptions,
    browser: OnceCell<Mutex<CdpBrowser>>,
}

impl ChromiumBrowser {
    pub fn new(options: ChromiumOptions) -> Self {
        Self {
            options,
            browser: OnceCell::new(),
        }
    }

    async fn ensure_browser(&self) -> BrowserResult<&Mutex<CdpBrowser>> {
        self.browser
            .get_or_try_init(|| async { launch(&self.options).await.map(Mutex::new) })
            .await
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_page(&self) -> BrowserResult<Arc<dyn BrowserPage>> {
        let browser = self.ensure_browser().await?.lock().await;
        let page = browser.new_page("about:blank").await?;
        Ok(Arc::new(ChromiumPage::new(page)))
    }
}

fn find_chrome(explicit: Option<&Path>) -> BrowserResult<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(BrowserError::Launch(format!(
            "chrome-executable {} does not exist",
            path.display()
        )));
    }

    CHROME_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            BrowserError::Launch(
                "Chrome/Chromium not found; install it or set chrome-executable".to_string(),
            )
        })
}

async fn launch(options: &ChromiumOptions) -> BrowserResult<CdpBrowser> {
    let executable = find_chrome(options.executable.as_deref())?;
    info!(
        "Launching Chromium at {} (headless={})",
        executable.display(),
        options.headless
    );

    let mut builder = BrowserConfig::builder()
        .chrome_executable(executable)
        .arg(format!("--user-agent={}", options.user_agent))
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--disable-gpu");
    if !options.headless {
        builder = builder.with_head();
    }
    let config = builder.build().map_err(BrowserError::Launch)?;

    let (browser, mut handler) = CdpBrowser::launch(config).await?;
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    Ok(browser)
}

/// Element flags as reported by the page's own DOM
#[derive(Debug, Deserialize)]
struct DomElementState {
    visible: bool,
    disabled_attr: bool,
    class_list: Vec<String>,
    aria_disabled: Option<String>,
}

impl From<DomElementState> for ElementState {
    fn from(state: DomElementState) -> Self {
        Self {
            visible: state.visible,
            disabled_attr: state.disabled_attr,
            class_list: state.class_list,
            aria_disabled: state.aria_disabled,
        }
    }
}

/// Script reporting the first match of a selector as a JSON string
fn element_state_script(selector: &str) -> BrowserResult<String> {
    let selector = serde_json::to_string(selector)
        .map_err(|e| BrowserError::InvalidSelector(e.to_string()))?;
    Ok(format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return JSON.stringify(null);
    let visible = true;
    for (let node = el; node && node.nodeType === 1; node = node.parentElement) {{
        const style = window.getComputedStyle(node);
        if (node.hidden || style.display === 'none' || style.visibility === 'hidden') {{
            visible = false;
            break;
        }}
    }}
    return JSON.stringify({{
        visible,
        disabled_attr: el.hasAttribute('disabled'),
        class_list: Array.from(el.classList),
        aria_disabled: el.getAttribute('aria-disabled'),
    }});
}})()"#
    ))
}

/// One Chromium tab
pub struct ChromiumPage {
    page: Page,
    /// URL before the last click, consumed by the next navigation wait
    clicked_from: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl ChromiumPage {
    fn new(page: Page) -> Self {
        Self {
            page,
            clicked_from: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> BrowserResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    async fn url(&self) -> BrowserResult<Option<String>> {
        Ok(self.page.url().await?)
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        debug!("Loading {}", url);
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(format!("loading {}", url)))??;
        Ok(())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        self.url()
            .await?
            .ok_or_else(|| BrowserError::Navigation("page has no URL".to_string()))
    }

    async fn content(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.page.content().await?)
    }

    async fn element_state(&self, selector: &str) -> BrowserResult<Option<ElementState>> {
        self.ensure_open()?;
        let json: String = self
            .page
            .evaluate(element_state_script(selector)?)
            .await?
            .into_value()
            .map_err(|e| BrowserError::Navigation(format!("element state: {}", e)))?;
        let state: Option<DomElementState> = serde_json::from_str(&json)
            .map_err(|e| BrowserError::Navigation(format!("element state: {}", e)))?;
        Ok(state.map(ElementState::from))
    }

    async fn click(&self, selector: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        *self.clicked_from.lock().await = self.url().await?;
        element.click().await?;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        let from = self.clicked_from.lock().await.take();
        let deadline = Instant::now() + timeout;

        loop {
            let url = self.url().await?;
            if url.is_some() && url != from {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if tokio::time::timeout(remaining, self.page.wait_for_navigation())
                    .await
                    .is_err()
                {
                    debug!("URL changed but the load did not finish in time");
                }
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout("navigation".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!("selector '{}'", selector)));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn reload(&self, timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        tokio::time::timeout(timeout, self.page.reload())
            .await
            .map_err(|_| BrowserError::Timeout("reload".to_string()))??;
        Ok(())
    }

    async fn close(&self) -> BrowserResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.page.clone().close().await?;
        Ok(())
    }
}
