//! Field extraction over an HTML snapshot
//!
//! Turns a container element plus a field-selector map into owned,
//! serializable values. Extraction never fails as a whole: every miss is
//! reported as a message next to a `None` value.

use crate::config::{FieldAttribute, FieldConfig};
use crate::url::resolve_url;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Values extracted from one container
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldExtraction {
    /// One entry per configured field; `None` means the field was not found
    pub values: BTreeMap<String, Option<String>>,

    /// Human-readable miss messages, one per `None`
    pub errors: Vec<String>,
}

impl FieldExtraction {
    /// Returns the value of a field if it was found
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_deref())
    }

    /// Whether the named field produced a value
    pub fn found(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Values extracted from every container on a page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageExtraction {
    /// One extraction per matched container, in document order
    pub items: Vec<FieldExtraction>,

    /// Page-level problems (missing container, unusable selector)
    pub errors: Vec<String>,
}

/// Extracts every configured field from a single container
///
/// # Arguments
///
/// * `container` - The element field selectors are evaluated against
/// * `fields` - Field name to extraction rule
/// * `page_url` - Base for resolving `href`/`src` values
pub fn extract_fields(
    container: ElementRef<'_>,
    fields: &BTreeMap<String, FieldConfig>,
    page_url: &Url,
) -> FieldExtraction {
    let mut extraction = FieldExtraction::default();

    for (name, field) in fields {
        let value = extract_field(container, field, page_url);

        if value.is_none() {
            let kind = if field.optional { "Optional" } else { "Required" };
            extraction.errors.push(format!(
                "{} field '{}' not found (selector: '{}', attribute: '{}')",
                kind, name, field.selector, field.attribute
            ));
        }

        extraction.values.insert(name.clone(), value);
    }

    extraction
}

/// Parses an HTML snapshot and extracts fields from every matching container
pub fn extract_page(
    html: &str,
    page_url: &Url,
    container_selector: &str,
    fields: &BTreeMap<String, FieldConfig>,
) -> PageExtraction {
    let document = Html::parse_document(html);
    let mut page = PageExtraction::default();

    let selector = match Selector::parse(container_selector) {
        Ok(selector) => selector,
        Err(e) => {
            page.errors.push(format!(
                "Invalid container selector '{}' ({:?}): no extractable data",
                container_selector, e
            ));
            return page;
        }
    };

    page.items = document
        .select(&selector)
        .map(|container| extract_fields(container, fields, page_url))
        .collect();

    if page.items.is_empty() {
        page.errors.push(format!(
            "Container '{}' not found on {}: no extractable data",
            container_selector, page_url
        ));
    }

    page
}

/// Extracts fields from the first matching container, as done for detail pages
pub fn extract_first(
    html: &str,
    page_url: &Url,
    container_selector: &str,
    fields: &BTreeMap<String, FieldConfig>,
) -> FieldExtraction {
    let mut page = extract_page(html, page_url, container_selector, fields);
    if page.items.is_empty() {
        return FieldExtraction {
            values: BTreeMap::new(),
            errors: page.errors,
        };
    }
    page.items.swap_remove(0)
}

fn extract_field(container: ElementRef<'_>, field: &FieldConfig, page_url: &Url) -> Option<String> {
    let target = if field.selector.trim().is_empty() {
        container
    } else {
        let selector = Selector::parse(&field.selector).ok()?;
        container.select(&selector).next()?
    };

    let value = match &field.attribute {
        FieldAttribute::Text => {
            let excluded = Exclusions::collect(target, &field.exclude_selectors);
            let mut text = String::new();
            collect_text(target, &excluded, &mut text);
            text.trim().to_string()
        }
        FieldAttribute::Href | FieldAttribute::Src => {
            let raw = target.value().attr(field.attribute.as_str())?;
            resolve_url(page_url, raw).ok()?.to_string()
        }
        FieldAttribute::Node => {
            if field.exclude_selectors.is_empty() {
                target.inner_html().trim().to_string()
            } else {
                let excluded = Exclusions::collect(target, &field.exclude_selectors);
                let mut markup = String::new();
                serialize_children(target, &excluded, &mut markup);
                markup.trim().to_string()
            }
        }
        FieldAttribute::Other(name) => target.value().attr(name)?.trim().to_string(),
    };

    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Descendants skipped while reading a field; the snapshot itself is untouched
struct Exclusions<'a> {
    elements: Vec<ElementRef<'a>>,
}

impl<'a> Exclusions<'a> {
    fn collect(root: ElementRef<'a>, selectors: &[String]) -> Self {
        let elements = selectors
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .flat_map(|selector| root.select(&selector).collect::<Vec<_>>())
            .collect();
        Self { elements }
    }

    fn contains(&self, element: &ElementRef<'a>) -> bool {
        self.elements.contains(element)
    }
}

fn collect_text(element: ElementRef<'_>, excluded: &Exclusions<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    if !excluded.contains(&child_element) {
                        collect_text(child_element, excluded, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn serialize_children(element: ElementRef<'_>, excluded: &Exclusions<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => escape_into(text, false, out),
            Node::Element(el) => {
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                if excluded.contains(&child_element) {
                    continue;
                }

                out.push('<');
                out.push_str(el.name());
                for (name, value) in el.attrs() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&el.name()) {
                    continue;
                }

                serialize_children(child_element, excluded, out);
                out.push_str("</");
                out.push_str(el.name());
                out.push('>');
            }
            _ => {}
        }
    }
}

fn escape_into(raw: &str, attribute: bool, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
