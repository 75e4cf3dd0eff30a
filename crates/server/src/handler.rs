//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    CacheKeysParams, CacheMatchParams, CachePurgeParams, ClientDetachParams, ServerState, WorkerFetchParams,
    WorkerUpdateParams, cache, worker,
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

/// The main MCP server handler for offvault.
#[derive(Clone)]
pub struct OffvaultServer {
    state: ServerState,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffvaultServer {
    /// Create a new server handler around a registered worker.
    pub fn new(state: ServerState) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Dispatch a fetch event to the active worker.
    ///
    /// Navigations fall back to the cached shell when the network is unreachable.
    #[tool(
        description = "Dispatch a fetch through the offline cache worker. Returns status, response type, headers, text body and whether it came from cache."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        worker::fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Show the active and waiting worker versions, controlled clients and cache store names.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        worker::status_impl(&self.state).await
    }

    /// Reload configuration and install a new version.
    #[tool(
        description = "Reload configuration and register the resulting worker version: precache its manifest, then activate it and evict older stores."
    )]
    async fn worker_update(&self, params: Parameters<WorkerUpdateParams>) -> Result<CallToolResult, McpError> {
        worker::update_impl(&self.state, params.0).await
    }

    #[tool(description = "Activate the waiting worker version now instead of waiting for open pages to close.")]
    async fn worker_skip_waiting(&self) -> Result<CallToolResult, McpError> {
        worker::skip_waiting_impl(&self.state).await
    }

    /// Open a page controlled by the active version.
    #[tool(
        description = "Attach an open page. Returns a client_id for worker_fetch; the page is controlled by the active version, if any."
    )]
    async fn client_attach(&self) -> Result<CallToolResult, McpError> {
        worker::attach_impl(&self.state).await
    }

    #[tool(
        description = "Detach an open page. Closing the last page of the active version lets a waiting version activate."
    )]
    async fn client_detach(&self, params: Parameters<ClientDetachParams>) -> Result<CallToolResult, McpError> {
        worker::detach_impl(&self.state, params.0).await
    }

    #[tool(description = "List entries of a cache store (default: the active store), oldest first.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        cache::keys_impl(&self.state, params.0).await
    }

    /// Look up one URL in a cache store. No network requests are made.
    #[tool(description = "Look up one URL in a cache store without touching the network.")]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        cache::match_impl(&self.state, params.0).await
    }

    #[tool(description = "Purge cache entries by age, by a route's expiration rules, or down to the newest N entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.state, params.0).await
    }
}

impl ServerHandler for OffvaultServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offvault".into(),
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
