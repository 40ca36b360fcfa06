//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    CacheGetParams, ControllerMessageParams, SiteFetchParams, fetch_impl, get_impl, message_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use sitecache_client::{CacheController, HttpNetwork};
use sitecache_core::CacheDb;

/// Controller type served over MCP.
pub type SiteController = CacheController<HttpNetwork, CacheDb>;

/// The main MCP server handler for sitecache.
#[derive(Clone)]
pub struct SiteCacheServer {
    controller: Arc<SiteController>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SiteCacheServer {
    /// Create a new server handler around a started controller.
    pub fn new(controller: Arc<SiteController>) -> Self {
        Self { controller, tool_router: Self::tool_router() }
    }

    /// Route a request through the offline cache controller.
    #[tool(
        description = "Fetch a URL (or origin-relative path) through the offline cache controller. Returns the response, whether the controller intercepted it, and its source: network, cache, offline-page, or synthetic."
    )]
    async fn site_fetch(&self, params: Parameters<SiteFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(self.controller.as_ref(), params.0).await
    }

    /// Send a control message to the controller.
    #[tool(
        description = "Send a control message: force-activate (skip waiting) or purge-cache (delete the current store)."
    )]
    async fn controller_message(
        &self, params: Parameters<ControllerMessageParams>,
    ) -> Result<CallToolResult, McpError> {
        message_impl(self.controller.as_ref(), params.0).await
    }

    /// Report lifecycle state and store contents.
    #[tool(description = "Report the controller's version, lifecycle state, current store and entry count.")]
    async fn controller_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(self.controller.as_ref()).await
    }

    /// Read a stored response without touching the network.
    #[tool(
        description = "Get the stored response for a URL from the current cache store. Fails with CACHE_MISS if absent."
    )]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.controller.as_ref(), params.0).await
    }
}

impl ServerHandler for SiteCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sitecache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
