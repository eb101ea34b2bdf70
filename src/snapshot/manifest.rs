//! Snapshot manifest and index records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Manifest file name at the snapshot root
pub const MANIFEST_FILE: &str = ".btca-website-manifest.json";

/// One JSON line per page, in crawl-completion order
pub const INDEX_FILE: &str = "_index.jsonl";

/// Directory holding the page markdown files
pub const PAGES_DIR: &str = "pages";

pub const MANIFEST_VERSION: u32 = 1;

/// One page entry, shared by the manifest and `_index.jsonl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPage {
    pub url: String,
    pub title: String,
    /// Path relative to the snapshot root, e.g. `pages/docs/intro.md`
    pub file_path: String,
    pub fetched_at: DateTime<Utc>,
}

/// Persisted description of a snapshot, and the only witness of its freshness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteManifest {
    pub version: u32,
    /// Normalized start URL the snapshot was crawled from
    pub url: String,
    pub scope_path: String,
    pub crawled_at: DateTime<Utc>,
    pub max_pages: usize,
    pub max_depth: u32,
    pub page_count: usize,
    pub pages: Vec<ManifestPage>,
}

impl WebsiteManifest {
    /// Checks whether the snapshot is younger than `ttl_hours` at `now`
    pub fn is_fresh(&self, ttl_hours: u64, now: DateTime<Utc>) -> bool {
        let age_seconds = (now - self.crawled_at).num_seconds();
        let ttl_seconds = i64::try_from(ttl_hours.saturating_mul(3600)).unwrap_or(i64::MAX);
        age_seconds < ttl_seconds
    }
}
