//! site_fetch tool implementation.
//!
//! Routes a request through the controller the way a controlled page would.
//! Requests the controller does not intercept are performed directly.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{
    CacheController, Destination, FetchOutcome, Method, Network, Request, ResponseSource, parse_request_url,
};
use sitecache_core::{CacheStorage, Error};

use super::{ResponseView, json_result};

/// Input parameters for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchParams {
    /// Absolute URL, or a path resolved against the controlled origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Request destination. Guessed from the path when omitted.
    #[serde(default)]
    pub destination: Option<Destination>,
}

/// Output structure for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// Whether the controller answered the request.
    pub intercepted: bool,
    /// Where the response came from; absent when not intercepted.
    pub source: Option<ResponseSource>,
    pub response: ResponseView,
}

/// Implementation of the site_fetch tool.
pub async fn fetch_impl<N, S>(
    controller: &CacheController<N, S>, params: SiteFetchParams,
) -> Result<CallToolResult, McpError>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = parse_request_url(&params.url, &controller.settings().origin)
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = match params.method.as_deref() {
        Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {m}")))?,
        None => Method::GET,
    };
    let destination = params
        .destination
        .unwrap_or_else(|| Destination::from_path(url.path()));
    let request = Request::get(url).with_method(method).with_destination(destination);

    let (response, source) = match controller.handle_fetch(&request).await? {
        FetchOutcome::Responded { response, source } => (response, Some(source)),
        FetchOutcome::NotIntercepted => {
            tracing::debug!("{} {} not intercepted; fetching directly", request.method, request.url);
            (controller.network().fetch(&request).await.map_err(Error::from)?, None)
        }
    };

    let output = SiteFetchOutput {
        url: request.url.to_string(),
        intercepted: source.is_some(),
        source,
        response: ResponseView::from(&response),
    };
    json_result(&output)
}
