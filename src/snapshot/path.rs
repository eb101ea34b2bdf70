use url::Url;

/// Maps a page URL to its file path inside a snapshot, e.g. `pages/docs/intro.md`
///
/// Each path segment is percent-decoded, lowercased, and has runs of
/// characters outside `[a-z0-9._-]` replaced with `-`. Segments that end up
/// empty or made only of dots become `index`. The last segment loses a
/// trailing `.html`/`.htm`, and `.md` is appended unless already present.
///
/// # Examples
///
/// ```
/// use sitesnap::snapshot::page_url_to_file_path;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/Docs/Getting%20Started.html").unwrap();
/// assert_eq!(page_url_to_file_path(&url), "pages/docs/getting-started.md");
///
/// let root = Url::parse("https://example.com/").unwrap();
/// assert_eq!(page_url_to_file_path(&root), "pages/index.md");
/// ```
pub fn page_url_to_file_path(url: &Url) -> String {
    let path = url.path().trim_start_matches('/');
    if path.is_empty() {
        return "pages/index.md".to_string();
    }

    let raw: Vec<&str> = path.split('/').collect();
    let last_index = raw.len() - 1;

    let segments: Vec<String> = raw
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let mut sanitized = sanitize_segment(segment);
            if i == last_index {
                sanitized = strip_html_extension(&sanitized);
            }
            if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
                "index".to_string()
            } else {
                sanitized
            }
        })
        .collect();

    let mut file_path = format!("pages/{}", segments.join("/"));
    if !file_path.ends_with(".md") {
        file_path.push_str(".md");
    }
    file_path
}

fn sanitize_segment(segment: &str) -> String {
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let mut sanitized = String::with_capacity(decoded.len());
    let mut in_run = false;
    for c in decoded.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
            sanitized.push(c);
            in_run = false;
        } else if !in_run {
            sanitized.push('-');
            in_run = true;
        }
    }
    sanitized.trim_matches('-').to_string()
}

fn strip_html_extension(segment: &str) -> String {
    segment
        .strip_suffix(".html")
        .or_else(|| segment.strip_suffix(".htm"))
        .unwrap_or(segment)
        .to_string()
}
