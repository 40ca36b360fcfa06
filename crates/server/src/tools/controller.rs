//! controller_message and controller_status tool implementations.

use std::str::FromStr;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_client::{CacheController, ControlMessage, LifecycleState, Network};
use sitecache_core::{CacheStorage, Error};

use super::json_result;

/// Parameters for the controller_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerMessageParams {
    /// "force-activate" or "purge-cache" (SKIP_WAITING / CLEAR_CACHE accepted).
    #[serde(rename = "type")]
    pub kind: String,
}

/// Output from the controller_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerMessageOutput {
    /// Canonical name of the applied message.
    pub message: String,
    /// Controller state after the message was applied.
    pub state: LifecycleState,
}

/// Implementation of the controller_message tool.
pub async fn message_impl<N, S>(
    controller: &CacheController<N, S>, params: ControllerMessageParams,
) -> Result<CallToolResult, McpError>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    let message = ControlMessage::from_str(&params.kind).map_err(|e| Error::InvalidInput(e.to_string()))?;
    controller.handle_message(message).await?;

    let output = ControllerMessageOutput { message: message.as_str().to_string(), state: controller.state().await };
    json_result(&output)
}

/// Implementation of the controller_status tool.
pub async fn status_impl<N, S>(controller: &CacheController<N, S>) -> Result<CallToolResult, McpError>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    let status = controller.status().await?;
    json_result(&status)
}
