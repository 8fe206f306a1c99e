//! MCP server handler implementation.
//!
//! Routes tool calls to the host that owns the manager instances.
use std::sync::Arc;

use crate::host::Host;
use crate::tools::{
    CacheListParams, CachePurgeParams, ClientDisconnectParams, FetchParams, WorkerMessageParams, WorkerRegisterParams,
    cache, clients, fetch, worker,
};

use reelcache_client::FetchClient;
use reelcache_core::CacheDb;
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

pub type ReelcacheHost = Host<CacheDb, FetchClient>;

/// The main MCP server handler for reelcache.
#[derive(Clone)]
pub struct ReelcacheServer {
    tool_router: ToolRouter<Self>,
    host: Arc<ReelcacheHost>,
}

#[tool_router]
impl ReelcacheServer {
    pub fn new(host: Arc<ReelcacheHost>) -> Self {
        Self { tool_router: Self::tool_router(), host }
    }

    #[tool(description = "Report the active and waiting instances, existing cache stores, and connected clients.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        worker::status_impl(&self.host).await
    }

    /// Install a new version. It waits while the current version still
    /// controls pages, unless told to skip waiting.
    #[tool(
        description = "Register and install a new cache version. Precaches the manifest; the new version waits while pages are controlled by the current one."
    )]
    async fn worker_register(&self, params: Parameters<WorkerRegisterParams>) -> Result<CallToolResult, McpError> {
        worker::register_impl(&self.host, params.0).await
    }

    #[tool(
        description = "Post a control message to the waiting instance (or the active one). {\"type\": \"SKIP_WAITING\"} activates a waiting version immediately."
    )]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        worker::message_impl(&self.host, params.0).await
    }

    #[tool(description = "Open a page. Returns a client id; the page is controlled by the active version.")]
    async fn client_connect(&self) -> Result<CallToolResult, McpError> {
        clients::connect_impl(&self.host).await
    }

    #[tool(description = "Close a page. When the last page of the active version closes, a waiting version takes over.")]
    async fn client_disconnect(&self, params: Parameters<ClientDisconnectParams>) -> Result<CallToolResult, McpError> {
        clients::disconnect_impl(&self.host, params.0).await
    }

    /// Network first; falls back to the active store when the network is
    /// unreachable.
    #[tool(
        description = "Fetch a URL as a controlled page would. Network first; successful GET responses are cached and served from cache when offline."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch::fetch_impl(&self.host, params.0).await
    }

    #[tool(description = "List cache stores, or the entries of one store.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        cache::list_impl(&self.host, params.0).await
    }

    #[tool(description = "Delete cache stores not used by the active or waiting version.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.host, params.0).await
    }
}

impl ServerHandler for ReelcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "reelcache".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use reelcache_client::FetchConfig;
    use reelcache_core::AppConfig;

    async fn server() -> ReelcacheServer {
        let storage = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        let host = Host::new(AppConfig::default(), storage, network).unwrap();
        ReelcacheServer::new(Arc::new(host))
    }

    #[tokio::test]
    async fn test_tools_listed() {
        let server = server().await;
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "cache_list",
                "cache_purge",
                "client_connect",
                "client_disconnect",
                "fetch",
                "worker_message",
                "worker_register",
                "worker_status",
            ]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = server().await;
        let info = server.get_info();
        assert_eq!(info.server_info.name, "reelcache");
        assert!(info.capabilities.tools.is_some());
    }
}
