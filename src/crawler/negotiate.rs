//! Markdown-variant content negotiation
//!
//! Many documentation sites publish the markdown source of a page at
//! `<path>.md` or `<path>/.md`. Support for each variant is tracked per origin
//! for the lifetime of one crawl, so a variant that 404s once is not probed
//! again for unrelated paths, and a variant that worked is tried first.

use crate::crawler::fetcher::{
    fetch_canonical, fetch_markdown_variant, is_html_content_type, is_markdown_content_type,
    looks_like_html, FetchError, FetchedBody,
};
use crate::url::origin_of;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// What is known about one markdown variant on one origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariantSupport {
    /// Never probed
    #[default]
    Unknown,
    /// A probe succeeded at least once
    Supported,
    /// The first probe failed
    Unsupported,
}

/// The two markdown-source URL shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkdownVariant {
    /// `/docs/intro` -> `/docs/intro.md`
    DotMd,
    /// `/docs/intro` -> `/docs/intro/.md`
    SlashDotMd,
}

impl MarkdownVariant {
    /// Variants in preference order
    pub const ALL: [MarkdownVariant; 2] = [MarkdownVariant::DotMd, MarkdownVariant::SlashDotMd];

    /// Builds the variant URL for a canonical page URL
    ///
    /// The root page maps to `/index.md` and `/.md`.
    pub fn variant_url(self, canonical: &Url) -> Url {
        let path = canonical.path().trim_end_matches('/');
        let variant_path = match self {
            MarkdownVariant::DotMd if path.is_empty() => "/index.md".to_string(),
            MarkdownVariant::DotMd => format!("{path}.md"),
            MarkdownVariant::SlashDotMd => format!("{path}/.md"),
        };

        let mut url = canonical.clone();
        url.set_path(&variant_path);
        url
    }

    pub fn label(self) -> &'static str {
        match self {
            MarkdownVariant::DotMd => ".md",
            MarkdownVariant::SlashDotMd => "/.md",
        }
    }
}

/// One step of the negotiation plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Variant already known to work on this origin
    Known(MarkdownVariant),
    /// First try of a variant; its outcome decides the origin state
    Probe(MarkdownVariant),
}

impl Attempt {
    pub fn variant(self) -> MarkdownVariant {
        match self {
            Attempt::Known(v) | Attempt::Probe(v) => v,
        }
    }
}

/// Markdown-variant support for a single origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OriginSupport {
    pub dot_md: VariantSupport,
    pub slash_dot_md: VariantSupport,
}

impl OriginSupport {
    pub fn get(&self, variant: MarkdownVariant) -> VariantSupport {
        match variant {
            MarkdownVariant::DotMd => self.dot_md,
            MarkdownVariant::SlashDotMd => self.slash_dot_md,
        }
    }

    fn set(&mut self, variant: MarkdownVariant, support: VariantSupport) {
        match variant {
            MarkdownVariant::DotMd => self.dot_md = support,
            MarkdownVariant::SlashDotMd => self.slash_dot_md = support,
        }
    }

    /// Returns the variant attempts to make before the canonical fetch
    ///
    /// Supported variants come first (`.md` before `/.md`), then one probe
    /// for each variant still unknown. Unsupported variants are skipped.
    pub fn plan(&self) -> Vec<Attempt> {
        let known = MarkdownVariant::ALL
            .into_iter()
            .filter(|v| self.get(*v) == VariantSupport::Supported)
            .map(Attempt::Known);
        let probes = MarkdownVariant::ALL
            .into_iter()
            .filter(|v| self.get(*v) == VariantSupport::Unknown)
            .map(Attempt::Probe);
        known.chain(probes).collect()
    }

    /// Applies the outcome of an attempt
    ///
    /// A probe settles the variant either way. A known-supported variant
    /// that fails stays supported, since the failure is path-specific.
    pub fn record(&mut self, attempt: Attempt, succeeded: bool) {
        match (attempt, succeeded) {
            (Attempt::Known(_), false) => {}
            (Attempt::Known(v), true) | (Attempt::Probe(v), true) => {
                self.set(v, VariantSupport::Supported)
            }
            (Attempt::Probe(v), false) => self.set(v, VariantSupport::Unsupported),
        }
    }
}

/// Per-crawl table of markdown support, keyed by origin
#[derive(Debug, Clone, Default)]
pub struct MarkdownSupport {
    origins: HashMap<String, OriginSupport>,
}

impl MarkdownSupport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current support for an origin (all unknown if never seen)
    pub fn get(&self, origin: &str) -> OriginSupport {
        self.origins.get(origin).copied().unwrap_or_default()
    }

    fn entry(&mut self, origin: &str) -> &mut OriginSupport {
        self.origins.entry(origin.to_string()).or_default()
    }
}

/// A fetched page body, tagged by how it must be extracted
#[derive(Debug, Clone)]
pub enum PageSource {
    /// Markdown source (variant, or a canonical non-HTML text response)
    Markdown(FetchedBody),
    /// HTML to run through the extractor
    Html(FetchedBody),
}

/// Checks whether a path already names a markdown file
pub fn is_variant_path(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".md")
}

/// Fetches a page, preferring a markdown-source variant over HTML
///
/// Runs the [`OriginSupport::plan`] for the page's origin, updating the
/// table as attempts resolve, then falls back to the canonical URL.
pub async fn fetch_page(
    client: &Client,
    support: &mut MarkdownSupport,
    url: &Url,
    timeout: Duration,
) -> Result<PageSource, FetchError> {
    if !is_variant_path(url.path()) {
        let origin = origin_of(url);
        for attempt in support.get(&origin).plan() {
            let variant_url = attempt.variant().variant_url(url);
            let result = fetch_markdown_variant(client, &variant_url, timeout).await;
            support.entry(&origin).record(attempt, result.is_ok());

            match result {
                Ok(body) => {
                    tracing::trace!("Using {} variant for {}", attempt.variant().label(), url);
                    return Ok(PageSource::Markdown(body));
                }
                Err(e) => {
                    tracing::trace!("{} variant rejected for {}: {}", attempt.variant().label(), url, e)
                }
            }
        }
    }

    let body = fetch_canonical(client, url, timeout).await?;
    let is_markdown = !is_html_content_type(&body.content_type)
        && !looks_like_html(&body.body)
        && (is_variant_path(url.path()) || is_markdown_content_type(&body.content_type));
    if is_markdown {
        Ok(PageSource::Markdown(body))
    } else {
        Ok(PageSource::Html(body))
    }
}
