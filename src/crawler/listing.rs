//! Listing-page extraction
//!
//! Turns one listing snapshot into `CrawledItem`s, dropping items whose
//! required fields are missing and recording field stats under run-wide
//! item indices.

use crate::config::SourceConfig;
use crate::extract::extract_page;
use crate::state::{CrawledItem, RunContext};
use crate::url::resolve_url;
use tracing::debug;
use url::Url;

/// An item kept from a listing page together with its run-wide index
#[derive(Debug, Clone)]
pub struct ListingItem {
    pub index: usize,
    pub item: CrawledItem,
}

/// Result of extracting one listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub items: Vec<ListingItem>,
    /// Containers matched on the page
    pub found: usize,
    /// Containers dropped for missing required fields
    pub filtered: usize,
    /// Listing-stage error messages
    pub errors: Vec<String>,
}

impl ListingPage {
    /// Items that survived filtering
    pub fn valid(&self) -> usize {
        self.found - self.filtered
    }
}

/// Extracts a listing page and updates the run's listing counters and stats
pub fn extract_listing(
    html: &str,
    page_url: &Url,
    source: &SourceConfig,
    ctx: &mut RunContext,
) -> ListingPage {
    let extraction = extract_page(html, page_url, &source.container_selector, &source.listing_fields);

    let mut page = ListingPage {
        found: extraction.items.len(),
        errors: extraction.errors,
        ..ListingPage::default()
    };

    let first_index = ctx.reserve_indices(page.found);

    for (offset, fields) in extraction.items.into_iter().enumerate() {
        let index = first_index + offset;

        let mut missing = Vec::new();
        for (name, config) in &source.listing_fields {
            let found = fields.found(name);
            ctx.metadata.listing_field_stats.record(name, index, found);
            if !found && !config.optional {
                missing.push(name.as_str());
            }
        }

        page.errors
            .extend(fields.errors.iter().map(|e| format!("Item {}: {}", index, e)));

        if !missing.is_empty() {
            page.errors.push(format!(
                "Item {} missing required fields: {}",
                index,
                missing.join(", ")
            ));
            page.filtered += 1;
            continue;
        }

        let mut item = CrawledItem::from_fields(&source.id, &fields.values);
        match resolve_url(page_url, &item.url) {
            Ok(url) => item.url = url.to_string(),
            Err(e) => {
                page.errors.push(format!(
                    "Item {} missing required fields: url ('{}' is not a usable link: {})",
                    index, item.url, e
                ));
                page.filtered += 1;
                continue;
            }
        }

        page.items.push(ListingItem { index, item });
    }

    ctx.metadata.items_found += page.found as u64;
    ctx.metadata.total_filtered_items += page.filtered as u64;

    debug!(
        "Listing {}: {} found, {} kept, {} filtered",
        page_url,
        page.found,
        page.items.len(),
        page.filtered
    );

    page
}
