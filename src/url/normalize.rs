use url::Url;

/// Normalizes a URL into the canonical form used for crawl deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL, resolving it against `base` when one is given
/// 2. Reject anything that is not `http` or `https`, or has no host
/// 3. Remove the fragment (everything after #)
/// 4. Remove the query string
/// 5. Remove a trailing slash (except for the root path `/`)
///
/// Host lowercasing, default-port removal and dot-segment resolution are
/// handled by the `url` parser itself.
///
/// # Arguments
///
/// * `input` - The URL (or relative reference, when `base` is given)
/// * `base` - Optional base URL to resolve relative references against
///
/// # Returns
///
/// * `Some(Url)` - Normalized URL
/// * `None` - The input could not be parsed or uses an unsupported scheme
///
/// # Examples
///
/// ```
/// use sitesnap::url::normalize_url;
///
/// let url = normalize_url("HTTPS://Example.COM/docs/?tab=1#intro", None).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs");
/// ```
pub fn normalize_url(input: &str, base: Option<&Url>) -> Option<Url> {
    let input = input.trim();
    let mut url = match base {
        Some(base) => base.join(input).ok()?,
        None => Url::parse(input).ok()?,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;

    url.set_fragment(None);
    url.set_query(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    Some(url)
}

/// Returns the `scheme://host[:port]` origin string for a URL
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
