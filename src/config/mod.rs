//! Configuration module for a11y-sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use a11y_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Crawling {} to depth {}", config.site.base_url, config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    AuthConfig, CheckerConfig, Config, CrawlerConfig, IgnoreConfig, OutputConfig,
    PositionCollapse, ScopeConfig, SiteConfig, StoreBackend,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::FAILURE_CATEGORIES;
