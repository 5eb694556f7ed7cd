//! Synchronous DOM inspection over HTML snapshots
//!
//! `scraper::Html` is not `Send`, so every document parsed here is dropped
//! before the caller reaches its next await point.

use crate::browser::{BrowserError, BrowserResult};
use scraper::{ElementRef, Html, Selector};

/// What pagination needs to know about a button before clicking it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementState {
    /// False when the element or an ancestor is hidden
    pub visible: bool,
    /// `disabled` attribute present
    pub disabled_attr: bool,
    pub class_list: Vec<String>,
    /// Raw `aria-disabled` value
    pub aria_disabled: Option<String>,
}

impl ElementState {
    /// Disabled by attribute, by a `disabled` class, or by `aria-disabled="true"`
    pub fn is_disabled(&self) -> bool {
        self.disabled_attr
            || self.class_list.iter().any(|c| c == "disabled")
            || self
                .aria_disabled
                .as_deref()
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false)
    }

    fn of(element: ElementRef<'_>) -> Self {
        let value = element.value();
        let visible = !is_hidden(element)
            && !element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(is_hidden);

        Self {
            visible,
            disabled_attr: value.attr("disabled").is_some(),
            class_list: value.classes().map(str::to_string).collect(),
            aria_disabled: value.attr("aria-disabled").map(str::to_string),
        }
    }
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    match value.attr("style") {
        Some(style) => {
            let style: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            style.contains("display:none") || style.contains("visibility:hidden")
        }
        None => false,
    }
}

pub(crate) fn parse_selector(selector: &str) -> BrowserResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| BrowserError::InvalidSelector(format!("'{}' ({:?})", selector, e)))
}

/// State of the first element matching `selector`, if any
pub fn find_element_state(html: &str, selector: &str) -> BrowserResult<Option<ElementState>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let state = document.select(&selector).next().map(ElementState::of);
    Ok(state)
}

/// Whether any element matches `selector`
pub fn has_element(html: &str, selector: &str) -> BrowserResult<bool> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

/// Link target of the first element matching `selector`
///
/// `Ok(None)` when the element exists but carries no `href`/`data-href`.
pub(crate) fn link_target(html: &str, selector: &str) -> BrowserResult<Option<String>> {
    let parsed = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;

    let value = element.value();
    let target = value
        .attr("href")
        .or_else(|| value.attr("data-href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(str::to_string);
    Ok(target)
}
