use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Main configuration structure for Folio Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a configured source by its id
    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == id)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of detail pages open at once
    #[serde(rename = "content-concurrency", default = "default_content_concurrency")]
    pub content_concurrency: u32,

    /// Maximum number of listing pages per run (unbounded when absent)
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Skip detail extraction for URLs already in the metadata store
    #[serde(rename = "skip-existing-urls", default = "default_true")]
    pub skip_existing_urls: bool,

    /// Stop a run once a whole listing page is already known
    #[serde(rename = "stop-on-all-duplicates", default = "default_true")]
    pub stop_on_all_duplicates: bool,

    /// How long to wait for a click to trigger navigation (milliseconds)
    #[serde(rename = "navigation-timeout-ms", default = "default_navigation_timeout")]
    pub navigation_timeout_ms: u64,

    /// How long to wait for a container selector to render (milliseconds)
    #[serde(rename = "container-timeout-ms", default = "default_container_timeout")]
    pub container_timeout_ms: u64,

    /// Timeout for a full page load (milliseconds)
    #[serde(rename = "page-load-timeout-ms", default = "default_page_load_timeout")]
    pub page_load_timeout_ms: u64,

    /// Pause between pagination retries (milliseconds)
    #[serde(rename = "retry-cooldown-ms", default = "default_retry_cooldown")]
    pub retry_cooldown_ms: u64,

    /// Run a passive WAL checkpoint every N listing pages
    #[serde(rename = "checkpoint-interval-pages", default = "default_checkpoint_interval")]
    pub checkpoint_interval_pages: u32,

    /// Page driver used for listing and detail pages
    #[serde(rename = "browser-engine", default)]
    pub browser_engine: BrowserEngine,

    /// Run Chromium without a window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chromium binary; common install locations are searched when absent
    #[serde(rename = "chrome-executable", default)]
    pub chrome_executable: Option<String>,
}

/// How pages are loaded and driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    /// Static HTTP fetches; clicks follow link targets
    #[default]
    Http,
    /// Headless Chromium over the DevTools protocol (`browser` feature)
    Chromium,
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Chromium => f.write_str("chromium"),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            content_concurrency: default_content_concurrency(),
            max_pages: None,
            skip_existing_urls: true,
            stop_on_all_duplicates: true,
            navigation_timeout_ms: default_navigation_timeout(),
            container_timeout_ms: default_container_timeout(),
            page_load_timeout_ms: default_page_load_timeout(),
            retry_cooldown_ms: default_retry_cooldown(),
            checkpoint_interval_pages: default_checkpoint_interval(),
            browser_engine: BrowserEngine::default(),
            headless: true,
            chrome_executable: None,
        }
    }
}

fn default_content_concurrency() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_navigation_timeout() -> u64 {
    3_000
}

fn default_container_timeout() -> u64 {
    10_000
}

fn default_page_load_timeout() -> u64 {
    30_000
}

fn default_retry_cooldown() -> u64 {
    2_000
}

fn default_checkpoint_interval() -> u32 {
    5
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "FolioHarvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory holding hash-keyed content blobs
    #[serde(rename = "content-dir")]
    pub content_dir: String,
}

/// One publication source: where its listing lives and how to read it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub id: String,

    pub name: String,

    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Selector matching one element per listed item
    #[serde(rename = "container-selector")]
    pub container_selector: String,

    #[serde(rename = "listing-fields", default)]
    pub listing_fields: BTreeMap<String, FieldConfig>,

    #[serde(default)]
    pub pagination: Option<PaginationConfig>,

    /// Selector scoping detail-page extraction (defaults to `body`)
    #[serde(rename = "detail-container-selector", default)]
    pub detail_container_selector: Option<String>,

    #[serde(rename = "detail-fields", default)]
    pub detail_fields: BTreeMap<String, FieldConfig>,
}

impl SourceConfig {
    /// Whether items from this source need a visit to their own page
    pub fn has_detail_fields(&self) -> bool {
        !self.detail_fields.is_empty()
    }

    /// Effective detail container selector
    pub fn detail_container(&self) -> &str {
        self.detail_container_selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("body")
    }

    /// Configured next-button selector, if any
    pub fn next_button_selector(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .map(|p| p.next_button_selector.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Pagination settings for a listing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationConfig {
    #[serde(rename = "next-button-selector")]
    pub next_button_selector: String,

    /// Settle delay applied after each click
    #[serde(rename = "delay-seconds", default)]
    pub delay_seconds: f64,
}

/// Governs how one field value is extracted
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FieldConfig {
    /// CSS selector relative to the container; empty means the container itself
    #[serde(default)]
    pub selector: String,

    #[serde(default)]
    pub attribute: FieldAttribute,

    #[serde(default)]
    pub optional: bool,

    /// Descendants removed before reading text or markup
    #[serde(rename = "exclude-selectors", default)]
    pub exclude_selectors: Vec<String>,
}

impl FieldConfig {
    /// Required text field for the given selector
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: FieldAttribute::Text,
            optional: false,
            exclude_selectors: Vec::new(),
        }
    }

    /// Builder-style switch to a different attribute kind
    pub fn with_attribute(mut self, attribute: FieldAttribute) -> Self {
        self.attribute = attribute;
        self
    }

    /// Builder-style switch to an optional field
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Builder-style addition of an exclusion selector
    pub fn excluding(mut self, selector: &str) -> Self {
        self.exclude_selectors.push(selector.to_string());
        self
    }
}

/// What to read from a matched element
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum FieldAttribute {
    /// Trimmed text content
    #[default]
    Text,
    /// `href`, resolved to an absolute URL
    Href,
    /// `src`, resolved to an absolute URL
    Src,
    /// Serialized inner markup
    Node,
    /// Any other attribute, returned raw
    Other(String),
}

impl FieldAttribute {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Href => "href",
            Self::Src => "src",
            Self::Node => "node",
            Self::Other(name) => name,
        }
    }

    /// Returns true for attributes that hold URLs
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Href | Self::Src)
    }
}

impl From<String> for FieldAttribute {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" | "" => Self::Text,
            "href" => Self::Href,
            "src" => Self::Src,
            "node" => Self::Node,
            _ => Self::Other(value),
        }
    }
}

impl From<FieldAttribute> for String {
    fn from(value: FieldAttribute) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
