//! analytics_fetch tool implementation.
//!
//! Performs a GET against the analytics API through the interception layer
//! and reports how the response was produced.

use anacache_client::fetch::api_url;
use anacache_client::{ApiRequest, ControlClient};
use anacache_core::{AppConfig, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json_result;
use crate::error::ToolError;

/// Input parameters for analytics_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsFetchParams {
    /// API path with optional query, e.g. `/lite/v1/analytics?range=7d`.
    pub path: String,

    /// Optional bearer credential forwarded to the API.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// Output structure for analytics_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsFetchOutput {
    /// Absolute URL requested.
    pub url: String,
    /// HTTP status of the response.
    pub status: u16,
    /// `HIT` or `STALE` when served from the store; absent for network responses.
    pub cache: Option<String>,
    /// ISO8601 store time of a store-served response.
    pub cache_date: Option<String>,
    /// Response body, parsed as JSON when possible.
    pub body: Value,
}

/// Implementation of the analytics_fetch tool.
pub async fn fetch_impl(
    client: &ControlClient, config: &AppConfig, params: AnalyticsFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.path.trim().is_empty() {
        return Err(ToolError::InvalidInput("path cannot be empty".into()).into());
    }

    let url = api_url(&config.api_base_url, &params.path).map_err(Error::from)?;
    let mut request = ApiRequest::get(url);
    if let Some(token) = params.bearer_token.as_deref() {
        request = request.with_bearer(token)?;
    }

    let response = client.fetch(request.clone()).await?;
    tracing::debug!(url = %request.url, status = response.status.as_u16(), cache = ?response.cache_status(), "analytics fetch");

    let body = response
        .json_body()
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).into_owned()));

    let output = AnalyticsFetchOutput {
        url: request.url.to_string(),
        status: response.status.as_u16(),
        cache: response.cache_status().map(str::to_string),
        cache_date: response.cache_date().map(str::to_string),
        body,
    };

    json_result(&output)
}
