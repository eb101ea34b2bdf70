//! Integration tests for the crawler and cache manager
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl and snapshot cycle end-to-end.

use async_trait::async_trait;
use sitesnap::crawler::{
    CrawlSettings, CrawlTarget, Crawler, RenderError, RenderedPage, Renderer, MAX_BODY_BYTES, MAX_REDIRECTS,
};
use sitesnap::snapshot::{read_manifest, WebsiteManifest, INDEX_FILE, MANIFEST_FILE};
use sitesnap::{CacheManager, SnapError, SnapshotStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_crawler() -> Crawler {
    let settings = CrawlSettings {
        robots_timeout: Duration::from_secs(5),
        sitemap_timeout: Duration::from_secs(5),
        page_timeout: Duration::from_secs(5),
        ..CrawlSettings::default()
    };
    Crawler::new(settings).expect("Failed to build crawler")
}

fn create_target(server: &MockServer, start_path: &str, max_pages: usize, max_depth: u32) -> CrawlTarget {
    CrawlTarget {
        start_url: Url::parse(&format!("{}{}", server.uri(), start_path)).unwrap(),
        max_pages,
        max_depth,
        ttl_hours: 24,
    }
}

fn html_page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>{title}</title></head><body>{body}</body></html>"),
        "text/html",
    )
}

async fn mount_get(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts a route that must never be requested
async fn mount_never(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page("Never", "<p>should not be fetched</p>"))
        .expect(0)
        .mount(server)
        .await;
}

fn page_paths(pages: &[sitesnap::crawler::CrawledPage]) -> Vec<String> {
    pages.iter().map(|p| p.url.path().to_string()).collect()
}

#[tokio::test]
async fn test_full_crawl_breadth_first_within_scope() {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/docs",
        html_page(
            "Docs",
            r#"<p>Welcome</p>
            <a href="/docs/a">A</a>
            <a href="/docs/b">B</a>
            <a href="/docs/a#section">A again</a>
            <a href="/blog/post">Blog</a>
            <a href="/docs/logo.png">Logo</a>"#,
        ),
    )
    .await;
    mount_get(&server, "/docs/a", html_page("A", r#"<p>Page A</p><a href="/docs/c">C</a>"#)).await;
    mount_get(&server, "/docs/b", html_page("B", "<p>Page B</p>")).await;
    mount_get(&server, "/docs/c", html_page("C", r#"<p>Page C</p><a href="/docs/d">D</a>"#)).await;
    mount_never(&server, "/docs/d").await;
    mount_never(&server, "/blog/post").await;
    mount_never(&server, "/docs/logo.png").await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await.unwrap();

    assert_eq!(outcome.scope_path, "/docs");
    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/a", "/docs/b", "/docs/c"]);
    assert_eq!(outcome.stats.fetched, 4);

    let home = &outcome.pages[0];
    assert_eq!(home.title, "Docs");
    assert!(home
        .markdown
        .starts_with(&format!("# Docs\n\nSource: {}/docs\n\nWelcome", server.uri())));
}

#[tokio::test]
async fn test_robots_and_sitemap_seeding() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_get(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /docs/private\n", "text/plain"),
    )
    .await;
    mount_get(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/docs/guide</loc></url>
  <url><loc>{base}/docs/private/secret</loc></url>
  <url><loc>{base}/pricing</loc></url>
</urlset>"#
            ),
            "application/xml",
        ),
    )
    .await;
    mount_get(&server, "/docs", html_page("Docs", "<p>No links here</p>")).await;
    mount_get(&server, "/docs/guide", html_page("Guide", "<p>Guide body</p>")).await;
    mount_never(&server, "/docs/private/secret").await;
    mount_never(&server, "/pricing").await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/guide"]);
}

#[tokio::test]
async fn test_noindex_page_links_still_followed() {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/docs",
        html_page(
            "Hub",
            r#"<meta name="robots" content="noindex"><p>Hub</p><a href="/docs/child">Child</a>"#,
        ),
    )
    .await;
    mount_get(&server, "/docs/child", html_page("Child", "<p>Child content</p>")).await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs/child"]);
    assert_eq!(outcome.stats.skipped_noindex, 1);
}

#[tokio::test]
async fn test_nofollow_page_links_not_followed() {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/docs",
        html_page(
            "Docs",
            r#"<meta name="robots" content="nofollow"><p>Docs</p><a href="/docs/child">Child</a>"#,
        ),
    )
    .await;
    mount_never(&server, "/docs/child").await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs"]);
}

#[tokio::test]
async fn test_max_pages_limit() {
    let server = MockServer::start().await;

    let links: String = (1..=5).map(|i| format!(r#"<a href="/docs/p{i}">P{i}</a>"#)).collect();
    mount_get(&server, "/docs", html_page("Docs", &links)).await;
    for i in 1..=5 {
        mount_get(&server, &format!("/docs/p{i}"), html_page(&format!("P{i}"), "<p>text</p>")).await;
    }

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 3, 2)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/p1", "/docs/p2"]);
}

#[tokio::test]
async fn test_markdown_variant_preferred() {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/docs.md",
        ResponseTemplate::new(200).set_body_raw(
            "# Docs\n\nRead the [guide](/docs/guide.md) first.\n",
            "text/markdown; charset=utf-8",
        ),
    )
    .await;
    mount_get(
        &server,
        "/docs/guide.md",
        ResponseTemplate::new(200).set_body_raw("# Guide\n\n## Install\n\nRun it.\n", "text/markdown"),
    )
    .await;
    mount_never(&server, "/docs").await;
    mount_never(&server, "/docs/guide").await;
    mount_never(&server, "/docs/.md").await;
    mount_never(&server, "/docs/guide/.md").await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/guide"]);
    let guide = &outcome.pages[1];
    assert_eq!(guide.title, "Guide");
    assert_eq!(guide.headings, vec!["Install"]);
    assert_eq!(
        guide.markdown,
        format!("# Guide\n\nSource: {}/docs/guide\n\n## Install\n\nRun it.\n", server.uri())
    );
}

#[tokio::test]
async fn test_html_served_as_markdown_falls_back_and_is_not_reprobed() {
    let server = MockServer::start().await;

    // SPA catch-all answering the .md variant with HTML
    Mock::given(method("GET"))
        .and(path("/docs.md"))
        .respond_with(html_page("App", "<div id=\"root\"></div>"))
        .expect(1)
        .mount(&server)
        .await;
    // Right content type, but an HTML document
    Mock::given(method("GET"))
        .and(path("/docs/.md"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<!DOCTYPE html><html></html>", "text/plain"))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/docs",
        html_page("Docs", r#"<p>Canonical docs</p><a href="/docs/next">Next</a>"#),
    )
    .await;
    mount_get(&server, "/docs/next", html_page("Next", "<p>Next page</p>")).await;
    mount_never(&server, "/docs/next.md").await;
    mount_never(&server, "/docs/next/.md").await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/next"]);
    assert!(outcome.pages[0].markdown.contains("Canonical docs"));
}

#[tokio::test]
async fn test_redirects_stay_on_origin() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;

    mount_get(
        &server,
        "/docs",
        html_page("Docs", r#"<p>Docs</p><a href="/docs/old">Old</a><a href="/docs/away">Away</a>"#),
    )
    .await;
    mount_get(
        &server,
        "/docs/old",
        ResponseTemplate::new(301).insert_header("location", "/docs/new"),
    )
    .await;
    mount_get(&server, "/docs/new", html_page("New", "<p>Moved here</p>")).await;
    mount_get(
        &server,
        "/docs/away",
        ResponseTemplate::new(302).insert_header("location", format!("{}/landing", elsewhere.uri()).as_str()),
    )
    .await;
    mount_never(&elsewhere, "/landing").await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/old"]);
    assert!(outcome.pages[1].markdown.contains("Moved here"));
    assert_eq!(outcome.stats.failed, 1);
}

/// Mounts `/docs/{name}0` redirecting `hops` times before a page
async fn mount_redirect_chain(server: &MockServer, name: &str, hops: usize) {
    for hop in 0..hops {
        mount_get(
            server,
            &format!("/docs/{name}{hop}"),
            ResponseTemplate::new(302).insert_header("location", format!("/docs/{name}{}", hop + 1).as_str()),
        )
        .await;
    }
    mount_get(
        server,
        &format!("/docs/{name}{hops}"),
        html_page("End", &format!("<p>End of {name} chain</p>")),
    )
    .await;
}

#[tokio::test]
async fn test_redirect_chain_limit() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/docs",
        html_page("Docs", r#"<p>Docs</p><a href="/docs/five0">Five</a><a href="/docs/six0">Six</a>"#),
    )
    .await;
    mount_redirect_chain(&server, "five", MAX_REDIRECTS).await;
    mount_redirect_chain(&server, "six", MAX_REDIRECTS + 1).await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 1)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/five0"]);
    assert!(outcome.pages[1].markdown.contains("End of five chain"));
    assert_eq!(outcome.stats.failed, 1);
}

/// An HTML page of exactly `len` bytes
fn sized_page(len: usize) -> ResponseTemplate {
    let head = "<html><head><title>Sized</title></head><body><p>";
    let tail = "</p></body></html>";
    let body = format!("{head}{}{tail}", "a ".repeat((len - head.len() - tail.len()) / 2));
    let body = format!("{body}{}", " ".repeat(len - body.len()));
    assert_eq!(body.len(), len);
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

#[tokio::test]
async fn test_body_size_limit() {
    let server = MockServer::start().await;
    let limit = MAX_BODY_BYTES as usize;
    mount_get(
        &server,
        "/docs",
        html_page("Docs", r#"<p>Docs</p><a href="/docs/exact">Exact</a><a href="/docs/over">Over</a>"#),
    )
    .await;
    mount_get(&server, "/docs/exact", sized_page(limit)).await;
    mount_get(&server, "/docs/over", sized_page(limit + 1)).await;

    let crawler = create_test_crawler();
    let outcome = crawler.crawl(&create_target(&server, "/docs", 50, 1)).await.unwrap();

    assert_eq!(page_paths(&outcome.pages), vec!["/docs", "/docs/exact"]);
    assert_eq!(outcome.stats.failed, 1);
}

#[tokio::test]
async fn test_crawl_exhausted_when_robots_blocks_everything() {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /\n", "text/plain"),
    )
    .await;
    mount_never(&server, "/docs").await;

    let crawler = create_test_crawler();
    let result = crawler.crawl(&create_target(&server, "/docs", 50, 2)).await;

    assert!(matches!(result, Err(SnapError::CrawlExhausted { .. })));
}

/// Renderer returning fixed HTML for every URL
struct StaticRenderer {
    html: String,
    final_url: Option<Url>,
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        Ok(RenderedPage {
            html: self.html.clone(),
            final_url: self.final_url.clone().unwrap_or_else(|| url.clone()),
        })
    }
}

const SPA_SHELL: &str =
    r#"<html><head><title>App</title></head><body><div id="root"></div><script src="/bundle.js"></script></body></html>"#;

fn rendered_html() -> String {
    format!(
        "<html><head><title>App</title></head><body><article><h2>Rendered</h2><p>{}</p></article></body></html>",
        "Client side content. ".repeat(40)
    )
}

#[tokio::test]
async fn test_render_fallback_replaces_shell() {
    let server = MockServer::start().await;
    mount_get(&server, "/app", ResponseTemplate::new(200).set_body_raw(SPA_SHELL, "text/html")).await;

    let crawler = create_test_crawler().with_renderer(Arc::new(StaticRenderer {
        html: rendered_html(),
        final_url: None,
    }));
    let outcome = crawler.crawl(&create_target(&server, "/app", 10, 1)).await.unwrap();

    assert_eq!(outcome.stats.rendered, 1);
    assert!(outcome.pages[0].markdown.contains("Client side content."));
    assert_eq!(outcome.pages[0].headings, vec!["Rendered"]);
}

#[tokio::test]
async fn test_render_to_other_origin_is_rejected() {
    let server = MockServer::start().await;
    mount_get(&server, "/app", ResponseTemplate::new(200).set_body_raw(SPA_SHELL, "text/html")).await;

    let crawler = create_test_crawler().with_renderer(Arc::new(StaticRenderer {
        html: rendered_html(),
        final_url: Some(Url::parse("https://login.example.net/").unwrap()),
    }));
    let outcome = crawler.crawl(&create_target(&server, "/app", 10, 1)).await.unwrap();

    assert_eq!(outcome.stats.rendered, 0);
    assert!(!outcome.pages[0].markdown.contains("Client side content."));
}

async fn mount_small_site(server: &MockServer) {
    mount_get(
        server,
        "/docs",
        html_page("Docs", r#"<p>Docs home</p><a href="/docs/intro">Intro</a>"#),
    )
    .await;
    mount_get(server, "/docs/intro", html_page("Intro", "<p>Introduction</p>")).await;
}

fn create_test_manager(dir: &TempDir) -> CacheManager {
    CacheManager::new(dir.path(), Arc::new(create_test_crawler())).allow_private_hosts()
}

/// Rewrites the manifest so the snapshot is past any TTL
fn age_snapshot(dir: &Path) -> WebsiteManifest {
    let manifest_path = dir.join(MANIFEST_FILE);
    let mut manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    manifest["crawledAt"] = serde_json::Value::String("2020-01-01T00:00:00Z".to_string());
    std::fs::write(&manifest_path, serde_json::to_string(&manifest).unwrap()).unwrap();
    read_manifest(dir).unwrap()
}

#[tokio::test]
async fn test_second_load_within_ttl_makes_no_requests() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let temp_dir = TempDir::new().unwrap();
    let manager = create_test_manager(&temp_dir);
    let target = create_target(&server, "/docs", 50, 2);

    let first = manager.ensure_snapshot("docs", &target, false).await.unwrap();
    assert_eq!(first.status, SnapshotStatus::Refreshed);
    assert_eq!(first.manifest.page_count, 2);
    assert!(first.path.join("pages/docs.md").is_file());
    assert!(first.path.join("pages/docs/intro.md").is_file());
    assert!(first.path.join(MANIFEST_FILE).is_file());
    let index = std::fs::read_to_string(first.path.join(INDEX_FILE)).unwrap();
    assert_eq!(index.lines().count(), 2);
    assert!(!temp_dir.path().join(".docs.partial").exists());

    let requests_after_first = server.received_requests().await.unwrap().len();

    let second = manager.ensure_snapshot("docs", &target, false).await.unwrap();
    assert_eq!(second.status, SnapshotStatus::Fresh);
    assert_eq!(second.path, first.path);
    assert_eq!(second.manifest, first.manifest);
    assert_eq!(server.received_requests().await.unwrap().len(), requests_after_first);
}

#[tokio::test]
async fn test_failed_refresh_serves_previous_snapshot() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let temp_dir = TempDir::new().unwrap();
    let manager = create_test_manager(&temp_dir);
    let target = create_target(&server, "/docs", 50, 2);

    let first = manager.ensure_snapshot("docs", &target, false).await.unwrap();

    let aged = age_snapshot(&first.path);

    // Every request now 404s
    server.reset().await;

    let second = manager.ensure_snapshot("docs", &target, false).await.unwrap();
    assert_eq!(second.status, SnapshotStatus::Stale);
    assert_eq!(second.path, first.path);
    assert_eq!(read_manifest(&second.path), Some(aged));
    let intro = std::fs::read_to_string(second.path.join("pages/docs/intro.md")).unwrap();
    assert!(intro.contains("Introduction"));
    assert!(!temp_dir.path().join(".docs.partial").exists());
}

#[tokio::test]
async fn test_expired_snapshot_is_replaced() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let temp_dir = TempDir::new().unwrap();
    let manager = create_test_manager(&temp_dir);
    let target = create_target(&server, "/docs", 50, 2);

    let first = manager.ensure_snapshot("docs", &target, false).await.unwrap();
    let aged = age_snapshot(&first.path);
    let requests_before = server.received_requests().await.unwrap().len();

    let second = manager.ensure_snapshot("docs", &target, false).await.unwrap();
    assert_eq!(second.status, SnapshotStatus::Refreshed);
    assert_eq!(second.path, first.path);
    assert!(second.manifest.crawled_at > aged.crawled_at);
    assert_eq!(read_manifest(&second.path), Some(second.manifest.clone()));
    assert!(server.received_requests().await.unwrap().len() > requests_before);
    assert!(!temp_dir.path().join(".docs.partial").exists());
    assert!(!temp_dir.path().join(".docs.old").exists());
}

#[tokio::test]
async fn test_forced_refresh_replaces_fresh_snapshot() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let temp_dir = TempDir::new().unwrap();
    let manager = create_test_manager(&temp_dir);
    let target = create_target(&server, "/docs", 50, 2);

    let first = manager.ensure_snapshot("docs", &target, false).await.unwrap();

    let forced = manager.ensure_snapshot("docs", &target, true).await.unwrap();
    assert_eq!(forced.status, SnapshotStatus::Refreshed);
    assert_eq!(forced.path, first.path);
    assert!(forced.manifest.crawled_at >= first.manifest.crawled_at);
    assert!(!temp_dir.path().join(".docs.old").exists());
}
