//! HTML and markdown page extraction
//!
//! This module turns a fetched page into a [`FetchedPage`]:
//! - title, headings and the markdown document written to the snapshot
//! - links to follow (from `<a>` tags, or inline links in markdown sources)
//! - robots meta directives (`noindex`, `nofollow`)
//! - a quality score and SPA-shell detection used by the render fallback

use crate::url::normalize_url;
use htmd::options::{BulletListMarker, CodeBlockStyle, HeadingStyle, Options};
use htmd::{Element, HtmlToMarkdown};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Maximum characters in a page document before truncation
pub const MAX_PAGE_CHARS: usize = 120_000;

/// Appended to documents cut at [`MAX_PAGE_CHARS`]
pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]\n";

/// Minimum text an `<article>`/`<main>` needs to be used as content root
const MIN_ROOT_TEXT_CHARS: usize = 200;

/// Minimum share of the body text an `<article>`/`<main>` needs
const MIN_ROOT_TEXT_SHARE: f64 = 0.25;

/// Below this much text a page may be an unrendered SPA shell
const SHELL_MAX_TEXT_CHARS: usize = 200;

/// Script count that marks a low-text page as a shell
const SHELL_MIN_SCRIPTS: usize = 6;

const MAX_HEADINGS: usize = 100;

/// Text length at which quality saturates
const QUALITY_FULL_TEXT_CHARS: f64 = 1500.0;

/// Elements never converted or counted as text
const STRIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Page chrome removed from the content root
const CHROME_TAGS: &[&str] = &["nav", "footer", "header", "aside"];

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static H1: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static BODY: LazyLock<Selector> = LazyLock::new(|| selector("body"));
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| selector("article"));
static MAIN: LazyLock<Selector> = LazyLock::new(|| selector("main"));
static META: LazyLock<Selector> = LazyLock::new(|| selector("meta[name][content]"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static SPA_ROOT: LazyLock<Selector> = LazyLock::new(|| {
    selector("#root, #app, #__next, #__nuxt, #svelte, [data-reactroot], [ng-version], app-root")
});

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("MARKDOWN_LINK_RE: hardcoded regex is valid")
});

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,3})\s+(.+?)\s*#*\s*$").expect("HEADING_RE: hardcoded regex is valid")
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("hardcoded selector is valid")
}

/// Robots meta directives found on a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// Page must not be stored
    pub noindex: bool,
    /// Links on the page must not be followed
    pub nofollow: bool,
}

/// Extracted information from a fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: String,
    /// First 100 h1-h3 heading texts
    pub headings: Vec<String>,
    /// Full page document: `# Title`, `Source:` line, then the body
    pub markdown: String,
    /// Normalized absolute links, in document order, deduplicated
    pub links: Vec<Url>,
    pub meta: PageMeta,
    /// Extraction quality in `[0, 1]`
    pub quality: f64,
    /// Looks like a client-rendered shell with no server-side content
    pub is_shell: bool,
}

/// Scores extraction quality from text length and script density
///
/// `min(1, text/1500) * (1 - min(0.85, scripts/40))`
pub fn quality_score(text_chars: usize, script_count: usize) -> f64 {
    let text_factor = (text_chars as f64 / QUALITY_FULL_TEXT_CHARS).min(1.0);
    let script_penalty = (script_count as f64 / 40.0).min(0.85);
    text_factor * (1.0 - script_penalty)
}

/// Extracts a page from HTML
///
/// # Arguments
///
/// * `html` - The HTML document
/// * `page_url` - Canonical URL of the page (used for the `Source:` line and title fallback)
/// * `base_url` - URL relative links resolve against (the post-redirect URL)
///
/// # Example
///
/// ```
/// use sitesnap::crawler::extract_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let url = Url::parse("https://example.com/").unwrap();
/// let page = extract_html(html, &url, &url);
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.links[0].as_str(), "https://example.com/page");
/// ```
pub fn extract_html(html: &str, page_url: &Url, base_url: &Url) -> FetchedPage {
    let document = Html::parse_document(html);

    let script_count = document.select(&SCRIPT).count();
    let meta = extract_meta(&document);
    let links = extract_links(&document, base_url);
    let title = extract_title(&document).unwrap_or_else(|| fallback_title(page_url));

    let root = choose_content_root(&document);
    let text_chars = root
        .map(|r| visible_text_chars(r, &[STRIPPED_TAGS, CHROME_TAGS].concat()))
        .unwrap_or(0);
    let converted = root
        .map(|r| convert_to_markdown(&r.inner_html()))
        .unwrap_or_default();
    let headings = markdown_headings(&converted);
    let body = drop_duplicate_title(&converted, &title);

    let is_shell = text_chars < SHELL_MAX_TEXT_CHARS
        && (document.select(&SPA_ROOT).next().is_some() || script_count >= SHELL_MIN_SCRIPTS);

    FetchedPage {
        headings,
        markdown: format_page(&title, page_url, &body),
        title,
        links,
        meta,
        quality: quality_score(text_chars, script_count),
        is_shell,
    }
}

/// Extracts a page from a markdown source
///
/// Links are resolved against `source_url` (the variant URL actually
/// fetched) and mapped back from `.md` / `/.md` to their canonical page URL.
pub fn extract_markdown(source: &str, page_url: &Url, source_url: &Url) -> FetchedPage {
    let text = source.trim_start_matches('\u{feff}').trim();

    let title = first_h1(text).unwrap_or_else(|| fallback_title(page_url));
    let body = drop_duplicate_title(text, &title);
    let headings = markdown_headings(&body);

    let mut seen = HashSet::new();
    let links = MARKDOWN_LINK_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter(|m| !is_skipped_href(m.as_str()))
        .filter_map(|m| source_url.join(m.as_str()).ok())
        .filter_map(|url| normalize_url(&canonical_from_markdown_url(&url), None))
        .filter(|url| seen.insert(url.as_str().to_string()))
        .collect();

    FetchedPage {
        headings,
        markdown: format_page(&title, page_url, &body),
        title,
        links,
        meta: PageMeta::default(),
        quality: 1.0,
        is_shell: false,
    }
}

/// Wraps a markdown body into the snapshot page format, truncating if needed
pub fn format_page(title: &str, url: &Url, body: &str) -> String {
    let document = format!("# {}\n\nSource: {}\n\n{}\n", title, url, body.trim());
    if document.chars().count() <= MAX_PAGE_CHARS {
        return document;
    }

    let mut truncated: String = document.chars().take(MAX_PAGE_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Returns the first 100 ATX h1-h3 texts outside fenced code blocks
pub fn markdown_headings(markdown: &str) -> Vec<String> {
    let mut headings = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = HEADING_RE.captures(line) {
            headings.push(caps[2].to_string());
            if headings.len() == MAX_HEADINGS {
                break;
            }
        }
    }
    headings
}

/// Picks `<article>`, then `<main>`, then `<body>` as the content root
///
/// Article and main are only promoted when they hold enough of the page's
/// text, so near-empty wrapper elements do not hide the real content.
fn choose_content_root(document: &Html) -> Option<ElementRef<'_>> {
    let body = document.select(&BODY).next();
    let body_chars = body
        .map(|b| visible_text_chars(b, STRIPPED_TAGS))
        .unwrap_or(0);

    for candidate_selector in [&*ARTICLE, &*MAIN] {
        if let Some(candidate) = document.select(candidate_selector).next() {
            let chars = visible_text_chars(candidate, STRIPPED_TAGS);
            if chars >= MIN_ROOT_TEXT_CHARS && chars as f64 >= body_chars as f64 * MIN_ROOT_TEXT_SHARE {
                return Some(candidate);
            }
        }
    }
    body
}

/// Counts whitespace-collapsed text characters, skipping `skip` subtrees
fn visible_text_chars(element: ElementRef<'_>, skip: &[&str]) -> usize {
    let mut text = String::new();
    collect_text(element, skip, &mut text);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1
}

fn collect_text(element: ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !skip.contains(&child_element.value().name()) {
                collect_text(child_element, skip, out);
            }
        }
    }
}

/// Converts an HTML fragment with fenced code, ATX headings and `-` bullets
///
/// Tables become GFM pipe tables and `<del>`/`<s>` become `~~strikethrough~~`.
fn convert_to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags([STRIPPED_TAGS, CHROME_TAGS].concat())
        .add_handler(vec!["del", "s", "strike"], strikethrough_handler)
        .add_handler(vec!["td", "th"], table_cell_handler)
        .add_handler(vec!["tr"], table_row_handler)
        .add_handler(vec!["table"], table_handler)
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style: CodeBlockStyle::Fenced,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .build();

    match converter.convert(html) {
        Ok(markdown) => markdown,
        Err(e) => {
            tracing::debug!("Markdown conversion failed: {}", e);
            String::new()
        }
    }
}

fn strikethrough_handler(element: Element) -> Option<String> {
    let content = element.content;
    let text = content.trim();
    if text.is_empty() {
        return None;
    }

    let leading = if content.starts_with(char::is_whitespace) { " " } else { "" };
    let trailing = if content.ends_with(char::is_whitespace) { " " } else { "" };
    Some(format!("{leading}~~{text}~~{trailing}"))
}

/// Emits ` cell |`; a row prepends the opening pipe
fn table_cell_handler(element: Element) -> Option<String> {
    let cell = element
        .content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|");
    Some(format!(" {cell} |"))
}

fn table_row_handler(element: Element) -> Option<String> {
    let cells = element.content.trim();
    if cells.is_empty() {
        return None;
    }
    Some(format!("\n| {cells}\n"))
}

/// Assembles rows into a pipe table, using the first row as the header
fn table_handler(element: Element) -> Option<String> {
    let mut rows = Vec::new();
    let mut other = Vec::new();
    for line in element.content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('|') {
            rows.push(line);
        } else {
            other.push(line);
        }
    }

    let Some(header) = rows.first() else {
        return Some(format!("\n\n{}\n\n", other.join("\n\n")));
    };
    let separator = format!("|{}", " --- |".repeat(count_table_cells(header)));

    let mut table = String::new();
    if !other.is_empty() {
        // captions and stray text ahead of the table
        table.push_str(&other.join("\n\n"));
        table.push_str("\n\n");
    }
    table.push_str(header);
    table.push('\n');
    table.push_str(&separator);
    for row in &rows[1..] {
        table.push('\n');
        table.push_str(row);
    }
    Some(format!("\n\n{table}\n\n"))
}

/// Counts cells in a pipe-table row, ignoring escaped pipes
fn count_table_cells(row: &str) -> usize {
    let mut pipes: usize = 0;
    let mut escaped = false;
    for c in row.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '|' if !escaped => pipes += 1,
            _ => escaped = false,
        }
    }
    pipes.saturating_sub(1).max(1)
}

/// Removes a leading `# Heading` line that repeats the title
fn drop_duplicate_title(markdown: &str, title: &str) -> String {
    let trimmed = markdown.trim_start();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));

    match first.trim().strip_prefix("# ") {
        Some(heading) if collapse_whitespace(heading).eq_ignore_ascii_case(&collapse_whitespace(title)) => {
            rest.trim_start().to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// `<title>`, else the first `<h1>`
fn extract_title(document: &Html) -> Option<String> {
    let text_of = |element: ElementRef<'_>| collapse_whitespace(&element.text().collect::<String>());

    document
        .select(&TITLE)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
        .or_else(|| document.select(&H1).next().map(text_of).filter(|s| !s.is_empty()))
}

/// First ATX `# ` heading of a markdown document, outside code fences
fn first_h1(markdown: &str) -> Option<String> {
    let mut in_fence = false;
    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            if let Some(heading) = line.strip_prefix("# ") {
                let heading = collapse_whitespace(heading.trim_end_matches('#'));
                if !heading.is_empty() {
                    return Some(heading);
                }
            }
        }
    }
    None
}

fn fallback_title(url: &Url) -> String {
    url.path().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reads `robots`/`googlebot` meta directives
fn extract_meta(document: &Html) -> PageMeta {
    let mut meta = PageMeta::default();

    for element in document.select(&META) {
        let name = element.value().attr("name").unwrap_or("").to_ascii_lowercase();
        if name != "robots" && name != "googlebot" {
            continue;
        }
        let content = element.value().attr("content").unwrap_or("").to_ascii_lowercase();
        for token in content.split(',').map(str::trim) {
            match token {
                "noindex" => meta.noindex = true,
                "nofollow" => meta.nofollow = true,
                "none" => {
                    meta.noindex = true;
                    meta.nofollow = true;
                }
                _ => {}
            }
        }
    }
    meta
}

/// Extracts all followable links from the document
///
/// # Link Extraction Rules
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links (same-page anchors)
/// - Anything that does not normalize to an http(s) URL
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&ANCHOR) {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if is_skipped_href(href) {
            continue;
        }
        if let Some(url) = normalize_url(href, Some(base_url)) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }
    links
}

fn is_skipped_href(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    href.is_empty()
        || href.starts_with('#')
        || ["javascript:", "mailto:", "tel:", "data:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
}

/// Maps a markdown-source URL back to the page URL it stands for
///
/// `/a/b.md` -> `/a/b`, `/a/b/.md` -> `/a/b/`, `/a/index.md` -> `/a/`
fn canonical_from_markdown_url(url: &Url) -> String {
    let mut canonical = url.clone();
    let path = url.path();
    let lower = path.to_ascii_lowercase();

    let stripped = if lower.ends_with("/index.md") {
        &path[..path.len() - "index.md".len()]
    } else if lower.ends_with(".md") {
        &path[..path.len() - ".md".len()]
    } else {
        path
    };
    canonical.set_path(stripped);
    canonical.to_string()
}
