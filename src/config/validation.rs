use crate::config::types::{BrowserEngine, Config, CrawlerConfig, FieldConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;

    if config.user_agent.crawler_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source id '{}'",
                source.id
            )));
        }
        validate_source(source)?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.content_concurrency < 1 || config.content_concurrency > 50 {
        return Err(ConfigError::Validation(format!(
            "content-concurrency must be between 1 and 50, got {}",
            config.content_concurrency
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.checkpoint_interval_pages < 1 {
        return Err(ConfigError::Validation(
            "checkpoint-interval-pages must be >= 1".to_string(),
        ));
    }

    if config.browser_engine == BrowserEngine::Chromium && !cfg!(feature = "browser") {
        return Err(ConfigError::Validation(
            "browser-engine = \"chromium\" needs a build with the `browser` feature".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.content_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "content-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates one source definition
///
/// Every selector is compiled once here so the crawl never meets an
/// unparsable selector mid-run.
pub fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    if source.id.trim().is_empty() {
        return Err(ConfigError::Validation("source id cannot be empty".to_string()));
    }

    let url = Url::parse(&source.listing_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid listing-url '{}' for source '{}': {}",
            source.listing_url, source.id, e
        ))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "listing-url '{}' must use http or https",
            source.listing_url
        )));
    }

    check_selector(&source.id, "container-selector", &source.container_selector)?;

    if let Some(selector) = &source.detail_container_selector {
        if !selector.trim().is_empty() {
            check_selector(&source.id, "detail-container-selector", selector)?;
        }
    }

    if let Some(pagination) = &source.pagination {
        if !pagination.next_button_selector.trim().is_empty() {
            check_selector(
                &source.id,
                "next-button-selector",
                &pagination.next_button_selector,
            )?;
        }
        if pagination.delay_seconds < 0.0 || !pagination.delay_seconds.is_finite() {
            return Err(ConfigError::Validation(format!(
                "delay-seconds for source '{}' must be a non-negative number",
                source.id
            )));
        }
    }

    check_fields(&source.id, &source.listing_fields)?;
    check_fields(&source.id, &source.detail_fields)?;

    if !source.listing_fields.contains_key("title") {
        return Err(ConfigError::Validation(format!(
            "Source '{}' must define a 'title' listing field",
            source.id
        )));
    }

    let url_field = source
        .listing_fields
        .get("url")
        .or_else(|| source.listing_fields.get("link"));
    match url_field {
        None => {
            return Err(ConfigError::Validation(format!(
                "Source '{}' must define a 'url' or 'link' listing field",
                source.id
            )))
        }
        Some(field) if field.optional => {
            return Err(ConfigError::Validation(format!(
                "The url field of source '{}' cannot be optional",
                source.id
            )))
        }
        Some(_) => {}
    }

    Ok(())
}

fn check_fields(source_id: &str, fields: &BTreeMap<String, FieldConfig>) -> Result<(), ConfigError> {
    for (name, field) in fields {
        if !field.selector.trim().is_empty() {
            check_selector(source_id, name, &field.selector)?;
        }
        for exclude in &field.exclude_selectors {
            check_selector(source_id, name, exclude)?;
        }
    }
    Ok(())
}

fn check_selector(source_id: &str, what: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector).map(|_| ()).map_err(|e| {
        ConfigError::InvalidSelector(format!(
            "source '{}', {}: '{}' ({:?})",
            source_id, what, selector, e
        ))
    })
}
