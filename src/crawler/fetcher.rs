//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent
//! - Following redirects manually, within the original origin only
//! - Enforcing the response size cap while reading bodies
//! - Content-Type checks for markdown variants and canonical pages
//! - Error classification

use crate::url::origin_of;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum response body size accepted for any fetch
pub const MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

/// Maximum number of redirect hops followed for one fetch
pub const MAX_REDIRECTS: usize = 5;

/// Why a single fetch attempt was rejected
///
/// These are soft failures: the crawl logs them and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Redirect from {from} leaves the origin ({to})")]
    CrossOriginRedirect { from: String, to: String },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Redirect from {url} has no usable Location header")]
    BadRedirect { url: String },

    #[error("{url} has unsupported content type '{content_type}'")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("{url} is larger than the 2 MB limit")]
    TooLarge { url: String },

    #[error("{url} returned an HTML document where markdown was expected")]
    HtmlBody { url: String },
}

/// A successfully fetched response body
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// URL after same-origin redirects
    pub final_url: Url,
    /// Content-Type header value (empty when absent)
    pub content_type: String,
    /// Body decoded as UTF-8 (lossy)
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client and followed by
/// [`fetch_following_redirects`], which enforces the same-origin rule.
/// Per-request timeouts are set by each caller.
///
/// # Example
///
/// ```no_run
/// use sitesnap::crawler::build_http_client;
///
/// let client = build_http_client("sitesnap/0.1").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a GET request, following at most [`MAX_REDIRECTS`] same-origin redirects
///
/// A redirect whose target is on another origin aborts the fetch.
pub async fn fetch_following_redirects(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<Response, FetchError> {
    let origin = origin_of(url);
    let mut current = url.clone();

    for _ in 0..=MAX_REDIRECTS {
        let response = client
            .get(current.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: current.to_string(),
                source,
            })?;

        if !response.status().is_redirection() {
            return Ok(response);
        }

        let next = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| current.join(location).ok())
            .ok_or_else(|| FetchError::BadRedirect {
                url: current.to_string(),
            })?;

        if origin_of(&next) != origin {
            return Err(FetchError::CrossOriginRedirect {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        tracing::trace!("Following redirect {} -> {}", current, next);
        current = next;
    }

    Err(FetchError::RedirectLimit {
        url: url.to_string(),
    })
}

/// Fetches a URL and returns its body regardless of Content-Type
///
/// Used for robots.txt and sitemap.xml. Non-2xx statuses are errors.
pub async fn fetch_text(client: &Client, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError> {
    let response = fetch_following_redirects(client, url, timeout).await?;
    read_success(response).await
}

/// Fetches a markdown-source variant of a page
///
/// The response is accepted only when it is a non-HTML `text/*` type, fits
/// the size cap, and the body does not start like an HTML document.
pub async fn fetch_markdown_variant(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<FetchedBody, FetchError> {
    let response = fetch_following_redirects(client, url, timeout).await?;
    let content_type = header_content_type(&response);
    if !is_markdown_content_type(&content_type) {
        return Err(FetchError::UnsupportedContentType {
            url: url.to_string(),
            content_type,
        });
    }

    let fetched = read_success(response).await?;
    if looks_like_html(&fetched.body) {
        return Err(FetchError::HtmlBody {
            url: url.to_string(),
        });
    }
    Ok(fetched)
}

/// Fetches the canonical (HTML) form of a page
///
/// Accepts HTML, XHTML, XML and any other `text/*` type.
pub async fn fetch_canonical(client: &Client, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError> {
    let response = fetch_following_redirects(client, url, timeout).await?;
    let content_type = header_content_type(&response);
    if !is_page_content_type(&content_type) {
        return Err(FetchError::UnsupportedContentType {
            url: url.to_string(),
            content_type,
        });
    }
    read_success(response).await
}

/// Checks the status and reads the body within [`MAX_BODY_BYTES`]
async fn read_success(mut response: Response) -> Result<FetchedBody, FetchError> {
    let final_url = response.url().clone();
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: final_url.to_string(),
            status: status.as_u16(),
        });
    }

    // Content-Length first, then the actual streamed size
    if response.content_length().is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(FetchError::TooLarge {
            url: final_url.to_string(),
        });
    }

    let content_type = header_content_type(&response);
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|source| FetchError::Http {
        url: final_url.to_string(),
        source,
    })? {
        if (bytes.len() + chunk.len()) as u64 > MAX_BODY_BYTES {
            return Err(FetchError::TooLarge {
                url: final_url.to_string(),
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(FetchedBody {
        final_url,
        content_type,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

fn header_content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Returns the lowercase MIME type without parameters
fn mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// HTML or XHTML
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = mime_type(content_type);
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Any `text/*` type other than HTML
pub fn is_markdown_content_type(content_type: &str) -> bool {
    let mime = mime_type(content_type);
    mime.starts_with("text/") && mime != "text/html"
}

/// Types the canonical fetch accepts: HTML, XHTML, XML or any `text/*`
pub fn is_page_content_type(content_type: &str) -> bool {
    let mime = mime_type(content_type);
    is_html_content_type(&mime)
        || mime.starts_with("text/")
        || mime.ends_with("/xml")
        || mime.ends_with("+xml")
}

/// Heuristic: does the body begin with an HTML document signature?
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();

    ["<!doctype html", "<html", "<head", "<body"]
        .iter()
        .any(|signature| head.starts_with(signature))
}
