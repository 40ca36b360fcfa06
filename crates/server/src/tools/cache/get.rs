//! cache_get tool implementation.
//!
//! Reads a stored response from the current version's store without touching
//! the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{CacheController, Network, parse_request_url};
use sitecache_core::{CacheStorage, Error};

use crate::tools::{ResponseView, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the controlled origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// Store the entry was found in.
    pub store: String,
    pub url: String,
    pub response: ResponseView,
}

/// Implementation of the cache_get tool.
pub async fn get_impl<N, S>(
    controller: &CacheController<N, S>, params: CacheGetParams,
) -> Result<CallToolResult, McpError>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    let url = parse_request_url(&params.url, &controller.settings().origin)
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let response = controller
        .storage()
        .match_entry(controller.store_name(), url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(url.to_string()))?;

    let output = CacheGetOutput {
        store: controller.store_name().to_string(),
        url: url.to_string(),
        response: ResponseView::from(&response),
    };
    json_result(&output)
}
