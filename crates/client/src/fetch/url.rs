//! URL canonicalization so equal requests map to equal store keys.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string so equal requests produce equal store keys.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing (including `//host/...`)
/// 3. Lowercase the host (done by the WHATWG parser for http/https)
/// 4. Remove fragment (#...), which never reaches the server
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{trimmed}")
    };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::InvalidUrl(format!("missing host: {trimmed}")));
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a request target against the site origin.
///
/// Paths starting with `/` (manifest entries, same-origin requests) are
/// joined onto `origin`; anything else is treated as an absolute URL.
pub fn resolve(origin: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        let joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        return canonicalize(joined.as_str());
    }
    canonicalize(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://app.reelmind.ai").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("app.reelmind.ai"));
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("app.reelmind.ai").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("app.reelmind.ai"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://APP.REELMIND.AI").unwrap();
        assert_eq!(url.host_str(), Some("app.reelmind.ai"));
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://app.reelmind.ai#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://app.reelmind.ai?a=1&b=2").unwrap();
        assert_eq!(url.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://app.reelmind.ai  ").unwrap();
        assert_eq!(url.as_str(), "https://app.reelmind.ai/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        let result = canonicalize("");
        assert!(matches!(result, Err(UrlError::Empty)));
    }

    #[test]
    fn test_canonicalize_whitespace_only() {
        let result = canonicalize("   ");
        assert!(matches!(result, Err(UrlError::Empty)));
    }

    #[test]
    fn test_canonicalize_http_allowed() {
        let url = canonicalize("http://app.reelmind.ai").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_resolve_path_against_origin() {
        let origin = url::Url::parse("https://App.ReelMind.ai").unwrap();
        let url = resolve(&origin, "/index.html").unwrap();
        assert_eq!(url.as_str(), "https://app.reelmind.ai/index.html");

        let root = resolve(&origin, "/").unwrap();
        assert_eq!(root.as_str(), "https://app.reelmind.ai/");
    }

    #[test]
    fn test_resolve_absolute_url_ignores_origin() {
        let origin = url::Url::parse("http://localhost:3000").unwrap();
        let url = resolve(&origin, "https://cdn.reelmind.ai/icon-192.png#x").unwrap();
        assert_eq!(url.as_str(), "https://cdn.reelmind.ai/icon-192.png");
    }

    #[test]
    fn test_resolve_scheme_relative_is_not_a_path() {
        let origin = url::Url::parse("http://localhost:3000").unwrap();
        let url = resolve(&origin, "//cdn.reelmind.ai/app.js").unwrap();
        assert_eq!(url.host_str(), Some("cdn.reelmind.ai"));
    }

    #[test]
    fn test_canonicalize_complex_path() {
        let url = canonicalize("https://app.reelmind.ai/path/to/resource?query=value#fragment").unwrap();
        assert_eq!(url.path(), "/path/to/resource");
        assert_eq!(url.query(), Some("query=value"));
        assert_eq!(url.fragment(), None);
    }
}
