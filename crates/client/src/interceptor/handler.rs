//! Request handling: freshness check, network refresh, stale fallback.

use std::sync::Arc;

use anacache_core::{CacheDb, CacheMetadata, Clock, Error, StoredEntry};
use futures_util::FutureExt;
use reqwest::header::{self, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::Interceptor;
use crate::fetch::{ApiRequest, ApiResponse, Network, X_CACHE, X_CACHE_DATE};

/// How a store-served response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Fresh entry, no network contact.
    Hit,
    /// Expired or unrefreshable entry served because the network failed.
    Stale,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Stale => "STALE",
        }
    }
}

/// Everything a refresh needs, owned so the refresh future is `'static` and
/// can be shared between coalesced callers.
#[derive(Clone)]
pub(super) struct Refresher {
    cache_name: String,
    storage: CacheDb,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
}

impl Refresher {
    /// Fetch from the network and, on a healthy JSON object response, persist
    /// it with a fresh metadata block. Returns the network response untouched.
    pub(super) async fn fetch_and_store(self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let response = self.network.fetch(&request).await?;
        if !response.is_success() {
            return Ok(response);
        }

        let payload: Value = serde_json::from_slice(&response.body)?;
        if !payload.is_object() {
            debug!(url = %request.url, "response is not a JSON object, not caching");
            return Ok(response);
        }

        let metadata = CacheMetadata {
            timestamp: self.clock.now_ms(),
            url: request.url.to_string(),
            endpoint: request.path().to_string(),
        };
        let entry = StoredEntry::with_metadata(request.method.as_str(), payload, metadata)?;
        self.storage.put_entry(&self.cache_name, &entry).await?;
        debug!(url = %request.url, "stored network response");

        Ok(response)
    }
}

impl Interceptor {
    /// Whether this layer handles the request rather than passing it through.
    pub fn intercepts(&self, request: &ApiRequest) -> bool {
        request.method == Method::GET && request.path().starts_with(&self.config.api_prefix)
    }

    /// Entry point for every request routed through the layer.
    ///
    /// Requests outside the monitored prefix go straight to the network and
    /// their transport errors propagate. Intercepted requests always yield a
    /// response.
    pub async fn handle_fetch(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        if !self.intercepts(&request) {
            return self.network.fetch(&request).await;
        }
        Ok(self.respond(&request).await)
    }

    async fn respond(&self, request: &ApiRequest) -> ApiResponse {
        match self.try_respond(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %request.url, error = %err, "interception failed, answering with 500");
                internal_error(&err)
            }
        }
    }

    async fn try_respond(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        let policy = self.config.policies.lookup(request.path());

        if policy.bypass {
            debug!(endpoint = request.path(), "bypass endpoint, going to network");
            return self.network.fetch(request).await;
        }

        let key = request.cache_key();
        let cached = match self.storage.match_entry(&self.config.cache_name, &key).await? {
            Some(entry) => match entry.split() {
                Ok((payload, Some(metadata))) => Some((payload, metadata)),
                Ok((_, None)) => None,
                Err(err) => {
                    debug!(endpoint = request.path(), error = %err, "stored body is not JSON, treating as miss");
                    None
                }
            },
            None => None,
        };

        if let Some((payload, metadata)) = &cached
            && policy.is_fresh(metadata.timestamp, self.clock.now_ms())
        {
            debug!(endpoint = request.path(), "cache hit");
            return Ok(cached_response(payload, metadata, CacheOutcome::Hit));
        }

        let refreshed = self.refresh(request, key).await;

        match (refreshed, cached) {
            (Ok(response), _) if response.is_success() => Ok(response),
            (outcome, Some((payload, metadata))) => {
                match &outcome {
                    Ok(response) => warn!(endpoint = request.path(), status = response.status.as_u16(), "upstream unhealthy, serving stale"),
                    Err(err) => warn!(endpoint = request.path(), error = %err, "refresh failed, serving stale"),
                }
                Ok(cached_response(&payload, &metadata, CacheOutcome::Stale))
            }
            (Ok(unhealthy), None) => Ok(unhealthy),
            (Err(err), None) => Err(err),
        }
    }

    async fn refresh(&self, request: &ApiRequest, key: String) -> Result<ApiResponse, Error> {
        let refresher = Refresher {
            cache_name: self.config.cache_name.clone(),
            storage: self.storage.clone(),
            network: self.network.clone(),
            clock: self.clock.clone(),
        };

        if !self.config.coalesce_requests {
            return refresher.fetch_and_store(request.clone()).await;
        }

        let request = request.clone();
        self.inflight
            .run(key, move || refresher.fetch_and_store(request).boxed())
            .await
    }
}

/// Synthesized 200 carrying a stored payload.
fn cached_response(payload: &Value, metadata: &CacheMetadata, outcome: CacheOutcome) -> ApiResponse {
    let mut response = ApiResponse::json(StatusCode::OK, payload);
    response.headers.insert(X_CACHE, HeaderValue::from_static(outcome.as_str()));
    if let Ok(date) = HeaderValue::from_str(&metadata.iso_timestamp()) {
        response.headers.insert(X_CACHE_DATE, date);
    }
    response
}

/// Synthesized 500 for faults inside the layer.
fn internal_error(err: &Error) -> ApiResponse {
    let mut response = ApiResponse::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "error": "Cache layer failure", "message": err.to_string() }),
    );
    response
        .headers
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
