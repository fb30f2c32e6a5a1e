//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use anacache_client::ControlClient;
use anacache_core::AppConfig;

use crate::tools::AnalyticsFetchParams;
use crate::tools::analytics::fetch_impl;
use crate::tools::cache::{CacheClearEndpointParams, clear_endpoint_impl, clear_impl, status_impl};

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

/// The main MCP server handler for anacache.
#[derive(Clone)]
pub struct AnacacheServer {
    tool_router: ToolRouter<Self>,
    client: Arc<ControlClient>,
    config: Arc<AppConfig>,
}

#[tool_router]
impl AnacacheServer {
    pub fn new(client: Arc<ControlClient>, config: Arc<AppConfig>) -> Self {
        Self { tool_router: Self::tool_router(), client, config }
    }

    /// GET an analytics API path through the interception layer.
    #[tool(
        description = "Fetch an analytics API path through the cache. Reports status, whether the response was a cache HIT or STALE fallback, and the JSON body."
    )]
    async fn analytics_fetch(&self, params: Parameters<AnalyticsFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.client, &self.config, params.0).await
    }

    #[tool(description = "Delete every cached analytics response across all cache generations.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.client).await
    }

    #[tool(description = "Delete cached responses stored for exactly one endpoint path.")]
    async fn cache_clear_endpoint(
        &self, params: Parameters<CacheClearEndpointParams>,
    ) -> Result<CallToolResult, McpError> {
        clear_endpoint_impl(&self.client, params.0).await
    }

    #[tool(description = "List cached endpoints with their store time, age in ms, and whether they are past their TTL.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.client).await
    }
}

impl ServerHandler for AnacacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "anacache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline-capable cache in front of an analytics API. Use analytics_fetch to read, cache_status to inspect freshness, and the cache_clear tools to invalidate."
                    .into(),
            ),
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
    use crate::tools::fixtures;

    #[tokio::test]
    async fn test_tools_are_routed() {
        let server = AnacacheServer::new(fixtures::client(&[]).await, Arc::new(AppConfig::default()));
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["analytics_fetch", "cache_clear", "cache_clear_endpoint", "cache_status"]);
    }
}
