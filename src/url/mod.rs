//! URL handling for Folio Harvest
//!
//! Listing and detail pages hand back relative, protocol-relative and
//! absolute links; everything stored or visited goes through [`resolve_url`].

mod resolve;

pub use resolve::{parse_page_url, resolve_url};
