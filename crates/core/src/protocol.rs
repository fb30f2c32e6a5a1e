//! Control messages exchanged between the control client and the
//! interception layer.
//!
//! Messages travel as JSON values so the wire shape matches what a page
//! context would post:
//!
//! - `{ "action": "CLEAR_CACHE" }` → `{ "success": bool }`
//! - `{ "action": "CLEAR_ENDPOINT_CACHE", "data": { "endpoint": "/x" } }` → `{ "success": bool }`
//! - `{ "action": "GET_CACHE_STATUS" }` → `{ "status": [...] }`
//! - anything else → `{ "error": "Unknown action" }`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error string replied for unrecognized actions.
pub const UNKNOWN_ACTION: &str = "Unknown action";

/// An administrative request understood by the interception layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ControlRequest {
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,

    #[serde(rename = "CLEAR_ENDPOINT_CACHE")]
    ClearEndpointCache { data: EndpointTarget },

    #[serde(rename = "GET_CACHE_STATUS")]
    GetCacheStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTarget {
    pub endpoint: String,
}

impl ControlRequest {
    pub fn clear_endpoint(endpoint: impl Into<String>) -> Self {
        Self::ClearEndpointCache { data: EndpointTarget { endpoint: endpoint.into() } }
    }

    /// Action tag as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Self::ClearCache => "CLEAR_CACHE",
            Self::ClearEndpointCache { .. } => "CLEAR_ENDPOINT_CACHE",
            Self::GetCacheStatus => "GET_CACHE_STATUS",
        }
    }

    /// Decode a posted message. Returns None for unknown or malformed actions.
    pub fn from_message(message: &Value) -> Option<Self> {
        serde_json::from_value(message.clone()).ok()
    }

    pub fn to_message(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Freshness report for a single stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStatusEntry {
    /// Request path the entry was stored under.
    pub endpoint: String,
    /// Store time in milliseconds since the epoch.
    pub timestamp: i64,
    /// Milliseconds elapsed since the store time.
    pub age: i64,
    /// Whether the age exceeds the endpoint's TTL.
    pub expired: bool,
}

/// Reply posted on the control reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Ack { success: bool },
    Status { status: Vec<CacheStatusEntry> },
    Error { error: String },
}

impl ControlReply {
    pub fn unknown_action() -> Self {
        Self::Error { error: UNKNOWN_ACTION.to_string() }
    }

    pub fn to_message(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_message(message: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        assert_eq!(ControlRequest::ClearCache.to_message(), json!({ "action": "CLEAR_CACHE" }));
        assert_eq!(
            ControlRequest::clear_endpoint("/lite/v1/analytics").to_message(),
            json!({ "action": "CLEAR_ENDPOINT_CACHE", "data": { "endpoint": "/lite/v1/analytics" } })
        );
    }

    #[test]
    fn test_request_from_message() {
        let request = ControlRequest::from_message(&json!({ "action": "GET_CACHE_STATUS" }));
        assert_eq!(request, Some(ControlRequest::GetCacheStatus));

        assert_eq!(ControlRequest::from_message(&json!({ "action": "REBOOT" })), None);
        assert_eq!(ControlRequest::from_message(&json!({ "action": "CLEAR_ENDPOINT_CACHE" })), None);
        assert_eq!(ControlRequest::from_message(&json!("CLEAR_CACHE")), None);
    }

    #[test]
    fn test_reply_wire_shape() {
        assert_eq!(ControlReply::Ack { success: true }.to_message(), json!({ "success": true }));
        assert_eq!(ControlReply::unknown_action().to_message(), json!({ "error": "Unknown action" }));

        let status = ControlReply::Status {
            status: vec![CacheStatusEntry { endpoint: "/x".into(), timestamp: 10, age: 5, expired: false }],
        };
        assert_eq!(
            status.to_message(),
            json!({ "status": [{ "endpoint": "/x", "timestamp": 10, "age": 5, "expired": false }] })
        );
    }

    #[test]
    fn test_reply_from_message() {
        let reply = ControlReply::from_message(json!({ "error": "Unknown action" })).unwrap();
        assert_eq!(reply, ControlReply::unknown_action());

        let reply = ControlReply::from_message(json!({ "status": [] })).unwrap();
        assert_eq!(reply, ControlReply::Status { status: vec![] });
    }
}
