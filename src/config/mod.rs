//! Configuration module for Sitesnap
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitesnap::config::{load_config, resolve_resources};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitesnap.toml")).unwrap();
//! for resource in resolve_resources(&config).unwrap() {
//!     println!("{} -> {}", resource.name, resource.target.start_url);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, LimitsConfig, RenderConfig, ResolvedResource, ResourceConfig, StorageConfig,
};

// Re-export parser and validation functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{resolve_resource, resolve_resources, validate_website_url};

use crate::crawler::CrawlSettings;
use std::time::Duration;

impl Config {
    /// Crawl settings derived from the `[crawler]` section
    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            user_agent: self.crawler.user_agent.clone(),
            robots_agent: self.crawler.robots_agent.clone(),
            robots_timeout: Duration::from_secs(self.crawler.robots_timeout_secs),
            sitemap_timeout: Duration::from_secs(self.crawler.sitemap_timeout_secs),
            page_timeout: Duration::from_secs(self.crawler.page_timeout_secs),
        }
    }
}
