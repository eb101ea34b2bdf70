//! Sitemap fetching
//!
//! Only `<loc>` values are read, by pattern rather than a full XML parse, so
//! sitemap indexes and malformed documents still yield whatever URLs they list.

use crate::crawler::fetch_text;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static LOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</loc>")
        .expect("LOC_RE: hardcoded regex is valid")
});

/// Extracts the `<loc>` URLs from sitemap XML, decoding XML entities
pub fn parse_sitemap(xml: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_xml_entities(m.as_str().trim()))
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Decodes the five predefined XML entities
///
/// `&amp;` is decoded last so that `&amp;lt;` stays `&lt;`.
fn decode_xml_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Fetches `{origin}/sitemap.xml` and returns the URLs it lists
///
/// Any failure yields an empty list, which leaves the crawl seeded by its
/// start URL alone.
pub async fn fetch_sitemap(client: &Client, origin: &str, timeout: Duration) -> Vec<String> {
    let Ok(sitemap_url) = Url::parse(&format!("{origin}/sitemap.xml")) else {
        return Vec::new();
    };

    match fetch_text(client, &sitemap_url, timeout).await {
        Ok(fetched) => {
            let locs = parse_sitemap(&fetched.body);
            tracing::debug!("sitemap.xml for {} lists {} URLs", origin, locs.len());
            locs
        }
        Err(e) => {
            tracing::debug!("No usable sitemap.xml for {}: {}", origin, e);
            Vec::new()
        }
    }
}
