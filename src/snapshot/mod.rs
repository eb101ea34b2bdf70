//! Snapshot directory building and reading
//!
//! A snapshot directory holds:
//! - `pages/**/*.md` - one markdown file per stored page
//! - `_index.jsonl` - one [`ManifestPage`] per line
//! - `.btca-website-manifest.json` - the [`WebsiteManifest`]

mod manifest;
mod path;

pub use manifest::{ManifestPage, WebsiteManifest, INDEX_FILE, MANIFEST_FILE, MANIFEST_VERSION, PAGES_DIR};
pub use path::page_url_to_file_path;

use crate::crawler::{CrawlTarget, CrawledPage};
use crate::SnapError;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::Path;

fn fs_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapError + '_ {
    move |source| SnapError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes a complete snapshot into `dir`
///
/// Pages are written in the order given; when two URLs map to the same file
/// path, the later page overwrites the earlier one.
///
/// # Arguments
///
/// * `dir` - Snapshot root (created if missing)
/// * `target` - The crawl parameters recorded in the manifest
/// * `scope_path` - The crawl's path scope
/// * `pages` - Stored pages in crawl-completion order
/// * `crawled_at` - Snapshot timestamp
///
/// # Returns
///
/// * `Ok(WebsiteManifest)` - The manifest that was written
/// * `Err(SnapError)` - A file could not be written
pub fn write_snapshot(
    dir: &Path,
    target: &CrawlTarget,
    scope_path: &str,
    pages: &[CrawledPage],
    crawled_at: DateTime<Utc>,
) -> Result<WebsiteManifest, SnapError> {
    fs::create_dir_all(dir.join(PAGES_DIR)).map_err(fs_error(dir))?;

    let index_path = dir.join(INDEX_FILE);
    let mut index = fs::File::create(&index_path).map_err(fs_error(&index_path))?;
    let mut entries = Vec::with_capacity(pages.len());

    for page in pages {
        let file_path = page_url_to_file_path(&page.url);
        let full_path = dir.join(&file_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(fs_error(parent))?;
        }
        fs::write(&full_path, &page.markdown).map_err(fs_error(&full_path))?;

        let entry = ManifestPage {
            url: page.url.to_string(),
            title: page.title.clone(),
            file_path,
            fetched_at: page.fetched_at,
        };
        writeln!(index, "{}", serde_json::to_string(&entry)?).map_err(fs_error(&index_path))?;
        entries.push(entry);
    }
    index.flush().map_err(fs_error(&index_path))?;

    let manifest = WebsiteManifest {
        version: MANIFEST_VERSION,
        url: target.start_url.to_string(),
        scope_path: scope_path.to_string(),
        crawled_at,
        max_pages: target.max_pages,
        max_depth: target.max_depth,
        page_count: entries.len(),
        pages: entries,
    };

    let manifest_path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(&manifest_path, json).map_err(fs_error(&manifest_path))?;

    tracing::debug!("Wrote {} pages to {}", manifest.page_count, dir.display());
    Ok(manifest)
}

/// Reads the manifest of the snapshot in `dir`
///
/// Returns `None` if it is missing, unreadable, or of another version.
pub fn read_manifest(dir: &Path) -> Option<WebsiteManifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&manifest_path).ok()?;

    match serde_json::from_str::<WebsiteManifest>(&content) {
        Ok(manifest) if manifest.version == MANIFEST_VERSION => Some(manifest),
        Ok(manifest) => {
            tracing::debug!(
                "Ignoring manifest version {} at {}",
                manifest.version,
                manifest_path.display()
            );
            None
        }
        Err(e) => {
            tracing::debug!("Unreadable manifest at {}: {}", manifest_path.display(), e);
            None
        }
    }
}

/// Checks that the index and every page file listed in `manifest` exist
pub fn is_complete(dir: &Path, manifest: &WebsiteManifest) -> bool {
    dir.join(INDEX_FILE).is_file()
        && manifest
            .pages
            .iter()
            .all(|page| dir.join(&page.file_path).is_file())
}
