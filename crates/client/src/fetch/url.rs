//! URL handling for request routing and manifest resolution.

use url::Url;

/// Error type for request URL parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Whether a URL uses a scheme the controller can fetch and cache.
///
/// Anything other than `http`/`https` (extension-internal, `data:`,
/// `blob:`, ...) is left to the host untouched.
pub fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Whether `host` is `pattern` itself or one of its subdomains.
///
/// Both sides are compared case-insensitively; a leading `.` on the pattern
/// is ignored.
pub fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().trim_start_matches('.');
    if pattern.is_empty() {
        return false;
    }
    let host = host.trim_end_matches('.');
    if host.eq_ignore_ascii_case(pattern) {
        return true;
    }
    host.len() > pattern.len()
        && host.as_bytes()[host.len() - pattern.len() - 1] == b'.'
        && host
            .get(host.len() - pattern.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(pattern))
}

/// Parse a request URL as a page would issue it.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve absolute paths (`/css/main.css`) against `origin`
/// 3. Default scheme to https:// when none is given (`data:`-style
///    URLs that cannot take one are parsed as-is)
/// 4. Remove fragment (#...); the host is lowercased by parsing
///
/// Non-http schemes are accepted here; routing decides what to do with them.
pub fn parse_request_url(input: &str, origin: &Url) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        origin.join(trimmed)
    } else if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{trimmed}")).or_else(|_| Url::parse(trimmed))
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    parsed.set_fragment(None);

    Ok(parsed)
}
