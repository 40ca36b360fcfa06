//! Network layer the controller forwards requests to.
//!
//! ### Failure signalling
//! - Transport failures (offline, DNS, connect, timeout) are errors.
//! - Every HTTP status, including 4xx/5xx, resolves to a [`Response`];
//!   deciding what a status means is the caller's job.
//!
//! ### Limits
//! - Timeout and redirect limit are enforced by the reqwest client.
//! - Max body bytes: 10MB (configurable)

pub mod request;
pub mod url;

use reqwest::{Client, header};
use sitecache_core::{AppConfig, Error, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use request::{Destination, Request};
pub use reqwest::Method;
pub use url::{UrlError, host_matches, is_fetchable, parse_request_url};

/// Error type for a rejected network request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection could not be established (offline, DNS, refused).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Body exceeded the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    /// Any other transport failure.
    #[error("network error: {0}")]
    Transport(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::Connect(err.to_string())
        } else {
            NetworkError::Transport(Arc::new(err))
        }
    }
}

impl From<NetworkError> for Error {
    fn from(err: NetworkError) -> Self {
        Error::Network(err.to_string())
    }
}

/// Outbound network access used by the controller.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Issue a single request. No retries.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Configuration for the HTTP network layer.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sitecache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sitecache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network layer with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn check_size(&self, size: u64) -> Result<(), NetworkError> {
        if size > self.config.max_bytes as u64 {
            return Err(NetworkError::TooLarge { size, limit: self.config.max_bytes });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;

        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| **name != header::SET_COOKIE)
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();

        let body = response.bytes().await?;
        self.check_size(body.len() as u64)?;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
