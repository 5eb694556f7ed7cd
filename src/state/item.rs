use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One harvested article
///
/// Field names configured for a source map onto the typed slots below;
/// anything else is kept verbatim in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledItem {
    pub url: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    /// ISO-8601 once normalized, raw page text before that
    pub published_date: Option<String>,
    pub crawled_at: DateTime<Utc>,
    /// Id of the source this item was harvested from
    pub source: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CrawledItem {
    /// Empty item for a source, stamped with the current time
    pub fn new(source: &str) -> Self {
        Self {
            url: String::new(),
            title: String::new(),
            content: String::new(),
            author: None,
            published_date: None,
            crawled_at: Utc::now(),
            source: source.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    /// Builds an item from extracted listing values
    pub fn from_fields(source: &str, values: &BTreeMap<String, Option<String>>) -> Self {
        let mut item = Self::new(source);
        item.apply_fields(values);
        item
    }

    /// Applies every present value; later calls win over earlier ones
    ///
    /// `BTreeMap` order puts `content` before `excerpt`, so an excerpt only
    /// fills `content` when no content value exists.
    pub fn apply_fields(&mut self, values: &BTreeMap<String, Option<String>>) {
        for (name, value) in values {
            if let Some(value) = value {
                self.set_field(name, value);
            }
        }
    }

    /// Routes one named value to its slot
    pub fn set_field(&mut self, name: &str, value: &str) {
        match name {
            "url" | "link" => self.url = value.to_string(),
            "title" => self.title = value.to_string(),
            "content" => self.content = value.to_string(),
            "excerpt" => {
                if self.content.is_empty() {
                    self.content = value.to_string();
                }
                self.metadata.insert(name.to_string(), value.to_string());
            }
            "author" => self.author = Some(value.to_string()),
            "published_date" | "date" => self.published_date = Some(value.to_string()),
            _ => {
                self.metadata.insert(name.to_string(), value.to_string());
            }
        }
    }

    /// Whether the item carries any body text
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}
