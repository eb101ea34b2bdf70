use crate::crawler::CrawlTarget;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Sitesnap
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceConfig>,
}

/// Network identity and timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Token matched against robots.txt `User-agent` groups
    #[serde(rename = "robots-agent")]
    pub robots_agent: String,

    #[serde(rename = "robots-timeout-secs")]
    pub robots_timeout_secs: u64,

    #[serde(rename = "sitemap-timeout-secs")]
    pub sitemap_timeout_secs: u64,

    #[serde(rename = "page-timeout-secs")]
    pub page_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("sitesnap/{}", env!("CARGO_PKG_VERSION")),
            robots_agent: "sitesnap".to_string(),
            robots_timeout_secs: 10,
            sitemap_timeout_secs: 12,
            page_timeout_secs: 15,
        }
    }
}

/// Where snapshots live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one snapshot directory per resource
    #[serde(rename = "resources-dir")]
    pub resources_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from("./resources"),
        }
    }
}

/// Defaults and upper bounds for per-resource crawl parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    #[serde(rename = "default-max-pages")]
    pub default_max_pages: u64,

    #[serde(rename = "max-pages-cap")]
    pub max_pages_cap: u64,

    #[serde(rename = "default-max-depth")]
    pub default_max_depth: u64,

    #[serde(rename = "max-depth-cap")]
    pub max_depth_cap: u64,

    #[serde(rename = "default-ttl-hours")]
    pub default_ttl_hours: u64,

    #[serde(rename = "max-ttl-hours")]
    pub max_ttl_hours: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_max_pages: 200,
            max_pages_cap: 500,
            default_max_depth: 3,
            max_depth_cap: 5,
            default_ttl_hours: 24,
            max_ttl_hours: 720,
        }
    }
}

/// Optional external render command, e.g. `["chromium", "--headless", "--dump-dom"]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Program and leading arguments; the page URL is appended
    pub command: Vec<String>,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 30,
        }
    }
}

/// One `[[resource]]` entry
///
/// Numeric fields are signed so that out-of-range values can be clamped
/// instead of failing to parse.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub url: String,

    #[serde(default, rename = "max-pages")]
    pub max_pages: Option<i64>,

    #[serde(default, rename = "max-depth")]
    pub max_depth: Option<i64>,

    #[serde(default, rename = "ttl-hours")]
    pub ttl_hours: Option<i64>,
}

/// A validated resource, ready to hand to the cache manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub name: String,
    /// Directory-safe key derived from the name
    pub key: String,
    pub target: CrawlTarget,
}
