//! Snapshot cache management
//!
//! Each resource owns `<resources_dir>/<key>/`. A load returns the existing
//! snapshot while its manifest is fresh; otherwise it crawls into
//! `<resources_dir>/.<key>.partial/` and swaps the result in only after the
//! whole snapshot is written, so a reader never sees a half-built directory.
//! When a refresh fails, a complete older snapshot of the same URL is
//! returned instead.

use crate::crawler::{CrawlTarget, Crawler};
use crate::snapshot::{is_complete, read_manifest, write_snapshot, WebsiteManifest};
use crate::url::resolves_to_private_address;
use crate::{SnapError, ValidationError};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a snapshot was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// Existing snapshot within its TTL; no network traffic
    Fresh,
    /// Newly crawled and committed
    Refreshed,
    /// Refresh failed; an older snapshot is served
    Stale,
}

/// A usable snapshot directory
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    pub path: PathBuf,
    pub status: SnapshotStatus,
    pub manifest: WebsiteManifest,
}

/// Derives a directory-safe resource key from a resource name
///
/// The name is lowercased and runs of characters outside `[a-z0-9._-]` become
/// `-`. Returns `None` if nothing usable is left.
///
/// # Examples
///
/// ```
/// use sitesnap::cache::resource_key;
///
/// assert_eq!(resource_key("Svelte Docs").as_deref(), Some("svelte-docs"));
/// assert_eq!(resource_key("???"), None);
/// ```
pub fn resource_key(name: &str) -> Option<String> {
    let mut key = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
            key.push(c);
            in_run = false;
        } else if !in_run {
            key.push('-');
            in_run = true;
        }
    }

    let key = key.trim_matches('-');
    if key.is_empty() || key.chars().all(|c| c == '.') {
        None
    } else {
        Some(key.to_string())
    }
}

/// Serves snapshots from disk, refreshing them through a [`Crawler`]
pub struct CacheManager {
    resources_dir: PathBuf,
    crawler: Arc<Crawler>,
    guard_private_hosts: bool,
}

impl CacheManager {
    /// Creates a cache manager rooted at `resources_dir`
    pub fn new(resources_dir: impl Into<PathBuf>, crawler: Arc<Crawler>) -> Self {
        Self {
            resources_dir: resources_dir.into(),
            crawler,
            guard_private_hosts: true,
        }
    }

    /// Skips the DNS check that refuses hosts resolving to private addresses
    ///
    /// Only meant for crawling local test servers.
    pub fn allow_private_hosts(mut self) -> Self {
        self.guard_private_hosts = false;
        self
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    /// Final snapshot directory for a resource key
    pub fn snapshot_dir(&self, key: &str) -> PathBuf {
        self.resources_dir.join(key)
    }

    fn partial_dir(&self, key: &str) -> PathBuf {
        self.resources_dir.join(format!(".{key}.partial"))
    }

    fn backup_dir(&self, key: &str) -> PathBuf {
        self.resources_dir.join(format!(".{key}.old"))
    }

    /// Returns a usable snapshot for `target`, crawling only when needed
    ///
    /// # Arguments
    ///
    /// * `key` - Resource key, see [`resource_key`]
    /// * `target` - What to crawl; `ttl_hours` decides freshness
    /// * `force` - Refresh even if the snapshot is fresh
    ///
    /// # Returns
    ///
    /// * `Ok(SnapshotHandle)` - Fresh, refreshed, or stale fallback snapshot
    /// * `Err(SnapError::RefreshFailed)` - The crawl failed and no usable snapshot exists
    pub async fn ensure_snapshot(
        &self,
        key: &str,
        target: &CrawlTarget,
        force: bool,
    ) -> Result<SnapshotHandle, SnapError> {
        let final_dir = self.snapshot_dir(key);
        let existing = read_manifest(&final_dir)
            .filter(|m| m.url == target.start_url.as_str() && is_complete(&final_dir, m));

        if let Some(manifest) = &existing {
            if !force && manifest.is_fresh(target.ttl_hours, Utc::now()) {
                tracing::info!(
                    "Using cached snapshot of {} ({} pages, crawled {})",
                    target.start_url,
                    manifest.page_count,
                    manifest.crawled_at
                );
                return Ok(SnapshotHandle {
                    path: final_dir,
                    status: SnapshotStatus::Fresh,
                    manifest: manifest.clone(),
                });
            }
        }

        if self.guard_private_hosts && resolves_to_private_address(&target.start_url).await {
            let host = target.start_url.host_str().unwrap_or_default().to_string();
            return Err(ValidationError::PrivateHost(host).into());
        }

        match self.refresh(key, target).await {
            Ok(manifest) => {
                tracing::info!(
                    "Committed snapshot of {} ({} pages) to {}",
                    target.start_url,
                    manifest.page_count,
                    final_dir.display()
                );
                Ok(SnapshotHandle {
                    path: final_dir,
                    status: SnapshotStatus::Refreshed,
                    manifest,
                })
            }
            Err(e) => match existing {
                Some(manifest) => {
                    tracing::warn!(
                        "Refresh of {} failed ({}); serving snapshot from {}",
                        target.start_url,
                        e,
                        manifest.crawled_at
                    );
                    Ok(SnapshotHandle {
                        path: final_dir,
                        status: SnapshotStatus::Stale,
                        manifest,
                    })
                }
                None => Err(SnapError::RefreshFailed {
                    url: target.start_url.to_string(),
                    source: Box::new(e),
                }),
            },
        }
    }

    /// Crawls into the partial directory and commits it
    async fn refresh(&self, key: &str, target: &CrawlTarget) -> Result<WebsiteManifest, SnapError> {
        let partial_dir = self.partial_dir(key);
        remove_dir_if_exists(&partial_dir)?;

        let result = match self.crawler.crawl(target).await {
            Ok(outcome) => write_snapshot(
                &partial_dir,
                target,
                &outcome.scope_path,
                &outcome.pages,
                Utc::now(),
            )
            .and_then(|manifest| {
                self.commit(key, &partial_dir)?;
                Ok(manifest)
            }),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(e) = remove_dir_if_exists(&partial_dir) {
                tracing::warn!("Failed to clean up {}: {}", partial_dir.display(), e);
            }
        }
        result
    }

    /// Swaps the partial directory in for the final one
    ///
    /// The old snapshot is moved aside first and restored if the swap fails.
    fn commit(&self, key: &str, partial_dir: &Path) -> Result<(), SnapError> {
        let final_dir = self.snapshot_dir(key);
        let backup_dir = self.backup_dir(key);

        remove_dir_if_exists(&backup_dir)?;
        if final_dir.exists() {
            fs::rename(&final_dir, &backup_dir).map_err(|source| SnapError::Filesystem {
                path: final_dir.clone(),
                source,
            })?;
        }

        if let Err(source) = fs::rename(partial_dir, &final_dir) {
            if backup_dir.exists() {
                if let Err(e) = fs::rename(&backup_dir, &final_dir) {
                    tracing::warn!("Failed to restore {}: {}", final_dir.display(), e);
                }
            }
            return Err(SnapError::Filesystem {
                path: final_dir,
                source,
            });
        }

        if let Err(e) = remove_dir_if_exists(&backup_dir) {
            tracing::warn!("Failed to remove old snapshot {}: {}", backup_dir.display(), e);
        }
        Ok(())
    }
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), SnapError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SnapError::Filesystem {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
