//! cache_status tool implementation.
//!
//! Reports the freshness of every stored analytics response.

use anacache_client::ControlClient;
use anacache_core::CacheStatusEntry;
use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    /// Whether an interception layer is registered.
    pub registered: bool,
    /// Store name of the registered layer.
    pub cache_name: Option<String>,
    /// ISO8601 time the report was produced.
    pub generated_at: String,
    pub entries: Vec<CacheStatusEntry>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(client: &ControlClient) -> Result<CallToolResult, McpError> {
    let registration = client.registration();
    let entries = client.get_cache_status().await;

    let output = CacheStatusOutput {
        registered: registration.is_some(),
        cache_name: registration.map(|r| r.cache_name),
        generated_at: Utc::now().to_rfc3339(),
        entries,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use anacache_client::ApiRequest;
    use anacache_client::fetch::api_url;
    use serde_json::json;

    use super::*;
    use crate::tools::{fixtures, result_json};

    #[tokio::test]
    async fn test_status_unregistered() {
        let client = fixtures::client(&[]).await;
        let output = result_json(&status_impl(&client).await.unwrap());
        assert_eq!(output["registered"], false);
        assert_eq!(output["entries"], json!([]));
    }

    #[tokio::test]
    async fn test_status_lists_entries() {
        let client = fixtures::client(&[("/lite/v1/analytics/business", json!({ "v": 1 }))]).await;
        client.register().await;
        let url = api_url("http://127.0.0.1:8080", "/lite/v1/analytics/business").unwrap();
        client.fetch(ApiRequest::get(url)).await.unwrap();

        let output = result_json(&status_impl(&client).await.unwrap());
        assert_eq!(output["registered"], true);
        assert_eq!(output["cache_name"], "analytics-cache-v1");
        assert_eq!(
            output["entries"],
            json!([{ "endpoint": "/lite/v1/analytics/business", "timestamp": 0, "age": 0, "expired": false }])
        );
    }
}
