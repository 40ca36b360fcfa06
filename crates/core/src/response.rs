//! Response model shared by the network layer and cache storage.

use std::borrow::Cow;

use bytes::Bytes;

/// Body of the synthetic response served when a sub-resource is neither
/// reachable nor stored.
pub const OFFLINE_BODY: &str = "Offline - Resource not available";

/// An HTTP response as seen by the controller.
///
/// Cloning is cheap (the body is reference counted), which is how a single
/// network response is both returned to the caller and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase, empty when unknown.
    pub status_text: String,
    /// Header name/value pairs in received order.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Bytes,
}

impl Response {
    /// Create a response with no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: String::new(), headers: Vec::new(), body: body.into() }
    }

    /// Add a header, keeping existing ones.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the reason phrase.
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// The synthetic `503` returned for unreachable, unstored sub-resources.
    pub fn unavailable() -> Self {
        Self::new(503, OFFLINE_BODY)
            .with_status_text("Service Unavailable")
            .with_header("Content-Type", "text/plain")
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only plain `200 OK` responses are written back to the store; partial
    /// and empty-bodied successes are returned but never persisted.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// Body decoded as UTF-8, lossy.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
