//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates one website crawl:
//! - Fetching robots.txt and sitemap.xml for the start origin
//! - Seeding and draining the breadth-first frontier
//! - Markdown-variant negotiation, extraction and the render fallback
//! - Collecting the pages that go into the snapshot

use crate::crawler::extract::{extract_html, extract_markdown, FetchedPage};
use crate::crawler::negotiate::{fetch_page, MarkdownSupport, PageSource};
use crate::crawler::render::{accept_render, needs_render, render_budget, Renderer};
use crate::crawler::scheduler::{CrawlQueueItem, Frontier};
use crate::crawler::{build_http_client, CrawlTarget, FetchError};
use crate::robots::fetch_robots;
use crate::sitemap::fetch_sitemap;
use crate::url::{normalize_url, origin_of, scope_path};
use crate::SnapError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Network identity and timeouts for crawling
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Agent token matched against robots.txt groups
    pub robots_agent: String,

    pub robots_timeout: Duration,
    pub sitemap_timeout: Duration,
    pub page_timeout: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("sitesnap/{}", env!("CARGO_PKG_VERSION")),
            robots_agent: "sitesnap".to_string(),
            robots_timeout: Duration::from_secs(10),
            sitemap_timeout: Duration::from_secs(12),
            page_timeout: Duration::from_secs(15),
        }
    }
}

/// A page kept for the snapshot
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: Url,
    pub title: String,
    pub markdown: String,
    /// First h1-h3 headings of the page
    ///
    /// Not written to the snapshot files; kept for library callers that
    /// build their own outline or search index over a crawl.
    pub headings: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Counters reported at the end of a crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Pages fetched and extracted
    pub fetched: usize,
    /// Pages whose fetch was rejected or failed
    pub failed: usize,
    /// Pages fetched but excluded by `noindex`
    pub skipped_noindex: usize,
    /// Pages whose rendered version replaced the original
    pub rendered: usize,
}

/// Result of a crawl with at least one page
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub scope_path: String,
    /// Pages in crawl-completion order
    pub pages: Vec<CrawledPage>,
    pub stats: CrawlStats,
}

/// Mutable state owned by a single crawl invocation
struct CrawlSession {
    frontier: Frontier,
    markdown: MarkdownSupport,
    renders_left: usize,
    pages: Vec<CrawledPage>,
    stats: CrawlStats,
}

/// Crawls websites into markdown pages
///
/// A `Crawler` holds only the HTTP client and configuration; every call to
/// [`Crawler::crawl`] starts from fresh per-crawl state, so one crawler can
/// serve many resources concurrently.
pub struct Crawler {
    client: Client,
    settings: CrawlSettings,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Crawler {
    /// Creates a crawler with its own HTTP client
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to crawl
    /// * `Err(SnapError)` - The HTTP client could not be built
    pub fn new(settings: CrawlSettings) -> Result<Self, SnapError> {
        let client = build_http_client(&settings.user_agent)?;
        Ok(Self {
            client,
            settings,
            renderer: None,
        })
    }

    /// Enables the render fallback
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Releases the renderer, if any
    pub async fn close(&self) {
        if let Some(renderer) = &self.renderer {
            renderer.close().await;
        }
    }

    /// Runs a breadth-first crawl of `target`
    ///
    /// This is the core crawling logic that:
    /// 1. Loads robots.txt and sitemap.xml for the start origin
    /// 2. Seeds the start URL (depth 0) and sitemap URLs (depth 1)
    /// 3. Fetches pages in FIFO order until the frontier drains or `max_pages` is reached
    /// 4. Follows links unless the page is `nofollow` or at `max_depth`
    ///
    /// Individual page failures are logged and skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - At least one page was collected
    /// * `Err(SnapError::CrawlExhausted)` - The traversal produced no pages
    pub async fn crawl(&self, target: &CrawlTarget) -> Result<CrawlOutcome, SnapError> {
        let start_time = Instant::now();
        let origin = origin_of(&target.start_url);
        let scope = scope_path(&target.start_url);
        tracing::info!(
            "Crawling {} (scope {}, max {} pages, depth {})",
            target.start_url,
            scope,
            target.max_pages,
            target.max_depth
        );

        let robots = fetch_robots(
            &self.client,
            &origin,
            &self.settings.robots_agent,
            self.settings.robots_timeout,
        )
        .await;
        let sitemap = fetch_sitemap(&self.client, &origin, self.settings.sitemap_timeout).await;

        let mut session = CrawlSession {
            frontier: Frontier::new(origin, scope.clone(), target.max_depth, robots),
            markdown: MarkdownSupport::new(),
            renders_left: render_budget(target.max_pages),
            pages: Vec::new(),
            stats: CrawlStats::default(),
        };

        if let Err(reason) = session.frontier.enqueue(target.start_url.clone(), 0) {
            tracing::warn!("Start URL {} rejected: {:?}", target.start_url, reason);
        }
        for loc in sitemap {
            if let Some(url) = normalize_url(&loc, None) {
                // Most sitemap entries are out of scope for a subtree crawl
                let _ = session.frontier.enqueue(url, 1);
            }
        }

        while session.pages.len() < target.max_pages {
            let Some(item) = session.frontier.pop() else {
                break;
            };
            tracing::debug!("Processing URL: {} (depth {})", item.url, item.depth);

            match self.fetch_and_extract(&mut session, &item).await {
                Ok(page) => {
                    session.stats.fetched += 1;
                    self.collect(&mut session, &item, page, target.max_depth);
                }
                Err(e) => {
                    session.stats.failed += 1;
                    tracing::debug!("Skipping {}: {}", item.url, e);
                }
            }
        }

        let stats = session.stats;
        tracing::info!(
            "Crawl of {} completed: {} pages ({} fetched, {} failed, {} noindex, {} rendered) in {:?}",
            target.start_url,
            session.pages.len(),
            stats.fetched,
            stats.failed,
            stats.skipped_noindex,
            stats.rendered,
            start_time.elapsed()
        );

        if session.pages.is_empty() {
            return Err(SnapError::CrawlExhausted {
                url: target.start_url.to_string(),
                visited: session.frontier.visited_count(),
            });
        }

        Ok(CrawlOutcome {
            scope_path: scope,
            pages: session.pages,
            stats,
        })
    }

    /// Fetches one page and extracts it, trying the renderer when needed
    async fn fetch_and_extract(
        &self,
        session: &mut CrawlSession,
        item: &CrawlQueueItem,
    ) -> Result<FetchedPage, FetchError> {
        let source = fetch_page(
            &self.client,
            &mut session.markdown,
            &item.url,
            self.settings.page_timeout,
        )
        .await?;

        let page = match source {
            PageSource::Markdown(body) => extract_markdown(&body.body, &item.url, &body.final_url),
            PageSource::Html(body) => {
                let page = extract_html(&body.body, &item.url, &body.final_url);
                self.maybe_render(session, &item.url, page).await
            }
        };
        Ok(page)
    }

    /// Replaces a poor extraction with a rendered one when that is clearly better
    async fn maybe_render(&self, session: &mut CrawlSession, url: &Url, page: FetchedPage) -> FetchedPage {
        let Some(renderer) = &self.renderer else {
            return page;
        };
        if session.renders_left == 0 || !needs_render(&page) {
            return page;
        }

        session.renders_left -= 1;
        tracing::debug!(
            "Rendering {} (quality {:.2}, shell: {})",
            url,
            page.quality,
            page.is_shell
        );

        match renderer.render(url).await {
            Ok(rendered) => {
                let candidate = extract_html(&rendered.html, url, &rendered.final_url);
                if accept_render(&page, &candidate, url, &rendered.final_url) {
                    session.stats.rendered += 1;
                    candidate
                } else {
                    tracing::debug!("Rendered version of {} is not better, keeping original", url);
                    page
                }
            }
            Err(e) => {
                tracing::debug!("Render of {} failed: {}", url, e);
                page
            }
        }
    }

    /// Enqueues a page's links and keeps it unless it is `noindex`
    fn collect(&self, session: &mut CrawlSession, item: &CrawlQueueItem, page: FetchedPage, max_depth: u32) {
        if !page.meta.nofollow && item.depth < max_depth {
            for link in page.links {
                if let Err(reason) = session.frontier.enqueue(link.clone(), item.depth + 1) {
                    tracing::trace!("Not following {}: {:?}", link, reason);
                }
            }
        }

        if page.meta.noindex {
            session.stats.skipped_noindex += 1;
            tracing::debug!("Not storing noindex page {}", item.url);
            return;
        }

        session.pages.push(CrawledPage {
            url: item.url.clone(),
            title: page.title,
            markdown: page.markdown,
            headings: page.headings,
            fetched_at: Utc::now(),
        });
    }
}
