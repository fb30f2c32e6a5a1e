//! Stored cache entries and their embedded metadata block.
//!
//! A cached API response is persisted as its JSON body with one extra
//! top-level field, `cacheMetadata`, describing when and for what it was
//! stored. The field is stripped again before a payload reaches a caller.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hash::compute_cache_key;
use crate::Error;

/// Reserved payload field carrying [`CacheMetadata`].
pub const CACHE_METADATA_FIELD: &str = "cacheMetadata";

/// Provenance block embedded in every stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Store time in milliseconds since the epoch.
    pub timestamp: i64,
    /// Absolute URL of the request.
    pub url: String,
    /// Request path.
    pub endpoint: String,
}

impl CacheMetadata {
    /// Store time as ISO-8601 with millisecond precision and a `Z` suffix.
    pub fn iso_timestamp(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// A row of a named cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub hash: String,
    pub method: String,
    pub url: String,
    pub endpoint: String,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredEntry {
    /// Build an entry from a JSON object payload, embedding `metadata`.
    ///
    /// Returns `MalformedPayload` when the payload is not a JSON object,
    /// since such a payload has nowhere to carry the metadata block.
    pub fn with_metadata(method: &str, mut payload: Value, metadata: CacheMetadata) -> Result<Self, Error> {
        let map = payload
            .as_object_mut()
            .ok_or_else(|| Error::MalformedPayload("cacheable payload must be a JSON object".into()))?;
        map.insert(CACHE_METADATA_FIELD.to_string(), serde_json::to_value(&metadata)?);

        Ok(Self {
            hash: compute_cache_key(method, &metadata.url),
            method: method.to_ascii_uppercase(),
            url: metadata.url.clone(),
            endpoint: metadata.endpoint.clone(),
            body: serde_json::to_vec(&payload)?,
            stored_at: metadata.iso_timestamp(),
        })
    }

    /// Build an entry from raw response bytes with no metadata block.
    pub fn raw(method: &str, url: &str, endpoint: &str, body: Vec<u8>) -> Self {
        Self {
            hash: compute_cache_key(method, url),
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            endpoint: endpoint.to_string(),
            body,
            stored_at: Utc::now().to_rfc3339(),
        }
    }

    /// Parse the body, returning the caller-facing payload and the metadata
    /// block if one was present and well-formed.
    pub fn split(&self) -> Result<(Value, Option<CacheMetadata>), Error> {
        let mut payload: Value = serde_json::from_slice(&self.body)?;
        let metadata = payload
            .as_object_mut()
            .and_then(|map| map.shift_remove(CACHE_METADATA_FIELD))
            .and_then(|raw| serde_json::from_value(raw).ok());
        Ok((payload, metadata))
    }

    /// Metadata block, or None for entries that lack one or are not JSON.
    pub fn metadata(&self) -> Option<CacheMetadata> {
        self.split().ok().and_then(|(_, metadata)| metadata)
    }
}
