//! Configuration module for Folio Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! including the per-source selector maps the crawler consumes.
//!
//! # Example
//!
//! ```no_run
//! use folio_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("{} sources configured", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserEngine, Config, CrawlerConfig, FieldAttribute, FieldConfig, OutputConfig, PaginationConfig,
    SourceConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{validate, validate_source};
