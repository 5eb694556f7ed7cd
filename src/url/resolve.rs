use crate::UrlError;
use url::Url;

/// Resolves a raw link against the page it was found on
///
/// # Resolution Steps
///
/// 1. Trim whitespace; reject an empty value
/// 2. Join against `base` (handles `/path`, `../path` and `//host/path`)
/// 3. Reject anything that is not HTTP or HTTPS
/// 4. Drop the fragment
///
/// # Examples
///
/// ```
/// use folio_harvest::url::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/news/page-2").unwrap();
/// let url = resolve_url(&base, "/articles/1#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/articles/1");
/// ```
pub fn resolve_url(base: &Url, raw: &str) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut url = base.join(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS links are followed, got: {}",
            url.scheme()
        )));
    }

    url.set_fragment(None);
    Ok(url)
}

/// Parses an absolute page URL
pub fn parse_page_url(raw: &str) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }
    Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))
}
