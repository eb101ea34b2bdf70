//! Crawler module for website fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with same-origin redirects and size limits
//! - Markdown-variant negotiation per origin
//! - HTML-to-markdown extraction and quality scoring
//! - The render fallback for client-rendered pages
//! - Breadth-first scheduling and overall crawl coordination

mod coordinator;
mod extract;
mod fetcher;
mod negotiate;
mod render;
mod scheduler;

pub use coordinator::{CrawlOutcome, CrawlSettings, CrawlStats, CrawledPage, Crawler};
pub use extract::{extract_html, extract_markdown, quality_score, FetchedPage, PageMeta};
pub use fetcher::{build_http_client, fetch_text, FetchError, FetchedBody, MAX_BODY_BYTES, MAX_REDIRECTS};
pub use negotiate::{MarkdownSupport, MarkdownVariant, OriginSupport, VariantSupport};
pub use render::{CommandRenderer, RenderError, RenderedPage, Renderer};
pub use scheduler::{CrawlQueueItem, Frontier, Rejection};

use url::Url;

/// What to crawl and how far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Normalized start URL; also the identity of the snapshot
    pub start_url: Url,

    /// Stop after this many stored pages
    pub max_pages: usize,

    /// Deepest link distance followed from the start URL
    pub max_depth: u32,

    /// Snapshot freshness window
    pub ttl_hours: u64,
}
