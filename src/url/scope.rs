use crate::url::origin_of;
use url::Url;

/// File extensions that never hold a crawlable document
const BINARY_EXTENSIONS: &[&str] = &[
    "7z", "atom", "avi", "avif", "bin", "bmp", "bz2", "css", "csv", "deb", "dmg", "doc", "docx",
    "eot", "exe", "gif", "gz", "ico", "iso", "jpeg", "jpg", "js", "json", "m4a", "map", "mjs",
    "mkv", "mov", "mp3", "mp4", "msi", "ogg", "otf", "pdf", "png", "ppt", "pptx", "rar", "rpm",
    "rss", "svg", "tar", "tgz", "tif", "tiff", "ttf", "wasm", "wav", "webm", "webp", "woff",
    "woff2", "xls", "xlsx", "xml", "xz", "zip",
];

/// Computes the path subtree a crawl starting at `start_url` may not leave
///
/// Trailing slashes are trimmed. When the last segment looks like a file
/// (contains a dot), the scope is its parent directory; otherwise it is the
/// full path. The root scope is `/`.
///
/// # Examples
///
/// ```
/// use sitesnap::url::scope_path;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/docs/guide/").unwrap();
/// assert_eq!(scope_path(&url), "/docs/guide");
///
/// let url = Url::parse("https://example.com/docs/index.html").unwrap();
/// assert_eq!(scope_path(&url), "/docs");
/// ```
pub fn scope_path(start_url: &Url) -> String {
    let trimmed = start_url.path().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let (parent, last) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
    if last.contains('.') {
        if parent.is_empty() {
            "/".to_string()
        } else {
            parent.to_string()
        }
    } else {
        trimmed.to_string()
    }
}

/// Checks whether `candidate` lies on `origin` inside `scope_path`
pub fn in_scope(candidate: &Url, origin: &str, scope_path: &str) -> bool {
    if origin_of(candidate) != origin {
        return false;
    }
    if scope_path == "/" {
        return true;
    }

    let path = candidate.path();
    path == scope_path
        || path
            .strip_prefix(scope_path)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Checks whether the last path segment carries a known binary file extension
pub fn has_binary_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_scope_root() {
        assert_eq!(scope_path(&url("https://example.com/")), "/");
        assert_eq!(scope_path(&url("https://example.com")), "/");
    }

    #[test]
    fn test_scope_directory() {
        assert_eq!(scope_path(&url("https://example.com/docs")), "/docs");
        assert_eq!(scope_path(&url("https://example.com/docs//")), "/docs");
    }

    #[test]
    fn test_scope_file_uses_parent() {
        assert_eq!(scope_path(&url("https://example.com/docs/v1.2")), "/docs");
        assert_eq!(scope_path(&url("https://example.com/index.html")), "/");
    }

    #[test]
    fn test_in_scope_same_subtree() {
        let origin = "https://example.com";
        assert!(in_scope(&url("https://example.com/docs"), origin, "/docs"));
        assert!(in_scope(&url("https://example.com/docs/intro"), origin, "/docs"));
        assert!(in_scope(&url("https://example.com/anything"), origin, "/"));
    }

    #[test]
    fn test_in_scope_rejects_sibling_prefix() {
        let origin = "https://example.com";
        assert!(!in_scope(&url("https://example.com/docs-old/a"), origin, "/docs"));
        assert!(!in_scope(&url("https://example.com/blog"), origin, "/docs"));
    }

    #[test]
    fn test_in_scope_rejects_other_origin() {
        let origin = "https://example.com";
        assert!(!in_scope(&url("https://other.com/docs"), origin, "/docs"));
        assert!(!in_scope(&url("http://example.com/docs"), origin, "/docs"));
        assert!(!in_scope(&url("https://example.com:8443/docs"), origin, "/"));
    }

    #[test]
    fn test_binary_extensions() {
        assert!(has_binary_extension("/assets/logo.PNG"));
        assert!(has_binary_extension("/downloads/release.tar.gz"));
        assert!(has_binary_extension("/static/app.js"));
        assert!(!has_binary_extension("/docs/intro"));
        assert!(!has_binary_extension("/docs/page.html"));
        assert!(!has_binary_extension("/docs/readme.md"));
        assert!(!has_binary_extension("/.pdf"));
    }
}
