//! cache_clear and cache_clear_endpoint tool implementations.

use anacache_client::ControlClient;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_clear_endpoint tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearEndpointParams {
    /// Exact request path whose stored responses are removed.
    pub endpoint: String,
}

/// Output from the cache clearing tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    pub success: bool,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(client: &ControlClient) -> Result<CallToolResult, McpError> {
    let success = client.clear_cache().await;
    json_result(&CacheClearOutput { success })
}

/// Implementation of the cache_clear_endpoint tool.
pub async fn clear_endpoint_impl(
    client: &ControlClient, params: CacheClearEndpointParams,
) -> Result<CallToolResult, McpError> {
    if !params.endpoint.starts_with('/') {
        return Err(ToolError::InvalidInput(format!("endpoint must start with '/': {:?}", params.endpoint)).into());
    }

    let success = client.clear_endpoint_cache(&params.endpoint).await;
    json_result(&CacheClearOutput { success })
}

#[cfg(test)]
mod tests {
    use anacache_client::ApiRequest;
    use anacache_client::fetch::api_url;
    use serde_json::json;

    use super::*;
    use crate::tools::{fixtures, result_json};

    #[tokio::test]
    async fn test_clear_endpoint() {
        let client = fixtures::client(&[("/lite/v1/analytics", json!({ "v": 1 }))]).await;
        client.register().await;
        let url = api_url("http://127.0.0.1:8080", "/lite/v1/analytics").unwrap();
        client.fetch(ApiRequest::get(url)).await.unwrap();

        let params = CacheClearEndpointParams { endpoint: "/lite/v1/analytics".into() };
        let output = result_json(&clear_endpoint_impl(&client, params).await.unwrap());
        assert_eq!(output, json!({ "success": true }));
        assert!(client.get_cache_status().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_endpoint_requires_absolute_path() {
        let client = fixtures::client(&[]).await;
        let params = CacheClearEndpointParams { endpoint: "analytics".into() };
        assert!(clear_endpoint_impl(&client, params).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_endpoint_without_layer_reports_failure() {
        let client = fixtures::client(&[]).await;
        let params = CacheClearEndpointParams { endpoint: "/lite/v1/analytics".into() };
        let output = result_json(&clear_endpoint_impl(&client, params).await.unwrap());
        assert_eq!(output, json!({ "success": false }));
    }

    #[tokio::test]
    async fn test_clear_all() {
        let client = fixtures::client(&[]).await;
        client.register().await;

        let output = result_json(&clear_impl(&client).await.unwrap());
        assert_eq!(output, json!({ "success": true }));
        assert!(client.container().storage().cache_names().await.unwrap().is_empty());
    }
}
