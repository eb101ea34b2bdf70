//! Sitesnap: cached markdown snapshots of websites
//!
//! This crate crawls a website from a start URL, converts the pages it reaches
//! to markdown, and keeps them in a local snapshot directory guarded by a
//! freshness manifest, so repeated loads of the same resource skip the network.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod robots;
pub mod sitemap;
pub mod snapshot;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for snapshot operations
#[derive(Debug, Error)]
pub enum SnapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid resource: {0}")]
    Validation(#[from] ValidationError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error(
        "Crawl of {url} produced no pages after visiting {visited} URLs; \
         robots.txt rules or noindex meta tags may be blocking the site"
    )]
    CrawlExhausted { url: String, visited: usize },

    #[error(
        "Failed to load {url} and no previous snapshot is available; \
         check network access to the site: {source}"
    )]
    RefreshFailed {
        url: String,
        #[source]
        source: Box<SnapError>,
    },

    #[error("Filesystem error at {}: {source} (check directory permissions)", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest serialization error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid resource '{name}': {source}")]
    Resource {
        name: String,
        #[source]
        source: ValidationError,
    },
}

/// Resource validation errors, raised before any crawl traffic
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Failed to parse URL {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ::url::ParseError,
    },

    #[error("Website URL must use https, got {0}")]
    NotHttps(String),

    #[error("Website URL {0} has no host")]
    MissingHost(String),

    #[error("Host {0} is private or local")]
    PrivateHost(String),

    #[error("Invalid resource name '{0}'")]
    InvalidName(String),
}

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, SnapError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{CacheManager, SnapshotHandle, SnapshotStatus};
pub use config::Config;
pub use crawler::{CrawlTarget, Crawler};
pub use snapshot::WebsiteManifest;
pub use crate::url::{in_scope, normalize_url, scope_path};
