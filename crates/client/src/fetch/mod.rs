//! HTTP side of the interception layer.
//!
//! Requests and responses are plain owned values so they can cross the
//! channel between callers and the layer task. The [`Network`] trait is the
//! seam between the layer and the analytics API; [`HttpNetwork`] is the
//! reqwest-backed implementation.

pub mod url;

use std::time::{Duration, Instant};

use anacache_core::Error;
use anacache_core::cache::hash::compute_cache_key;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;

pub use self::url::{UrlError, api_url};

/// Marks responses served from the store: `HIT` or `STALE`.
pub const X_CACHE: &str = "x-cache";

/// ISO-8601 store time of a response served from the store.
pub const X_CACHE_DATE: &str = "x-cache-date";

/// A request headed for the analytics API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Attach a bearer credential.
    pub fn with_bearer(mut self, token: &str) -> Result<Self, Error> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::InvalidInput(format!("invalid bearer token: {e}")))?;
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(self)
    }

    /// Request path, which is also the endpoint policy key.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Store key for this request.
    pub fn cache_key(&self) -> String {
        compute_cache_key(self.method.as_str(), self.url.as_str())
    }
}

/// A complete response, body already read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// JSON response with `Content-Type: application/json`.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self { status, headers, body: Bytes::from(body.to_string()) }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Value of `X-Cache`, None for responses that came from the network.
    pub fn cache_status(&self) -> Option<&str> {
        self.headers.get(X_CACHE).and_then(|v| v.to_str().ok())
    }

    /// Value of `X-Cache-Date`.
    pub fn cache_date(&self) -> Option<&str> {
        self.headers.get(X_CACHE_DATE).and_then(|v| v.to_str().ok())
    }

    pub fn json_body(&self) -> Result<Value, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Transport to the analytics API.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. Non-2xx statuses are returned as responses;
    /// only transport failures are errors.
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, Error>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "anacache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "anacache/0.1".to_string(), max_bytes: 5 * 1024 * 1024, timeout: Duration::from_millis(20000) }
    }
}

impl From<&anacache_core::AppConfig> for FetchConfig {
    fn from(config: &anacache_core::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_bytes: config.max_bytes, timeout: config.timeout() }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{}: {}", request.url, e))
                } else {
                    Error::HttpError(format!("network error: {}", e))
                }
            })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched from network"
        );

        Ok(ApiResponse { status, headers, body })
    }
}
