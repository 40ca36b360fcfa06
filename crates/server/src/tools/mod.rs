//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sitecache server.

pub mod cache;
pub mod controller;
pub mod site_fetch;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_core::{Error, Response};

pub use cache::{CacheGetParams, get_impl};
pub use controller::{ControllerMessageParams, message_impl, status_impl};
pub use site_fetch::{SiteFetchParams, fetch_impl};

/// A response as returned to MCP clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: response.text().into_owned(),
        }
    }
}

/// Serialize tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::Serialization(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
