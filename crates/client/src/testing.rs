//! Scripted network for exercising the layer without sockets.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anacache_core::Error;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::fetch::{ApiRequest, ApiResponse, Network};

/// Absolute URL on the test API origin.
pub(crate) fn api(path: &str) -> Url {
    Url::parse(&format!("https://api.example.com{path}")).unwrap()
}

/// Answers by request path from a routing table. Unknown paths get 404.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond_json(&self, path: &str, body: Value) {
        self.respond_raw(path, StatusCode::OK, &body.to_string());
    }

    pub(crate) fn respond_status(&self, path: &str, status: StatusCode) {
        self.respond_raw(path, status, r#"{"error":"upstream"}"#);
    }

    pub(crate) fn respond_raw(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, Bytes::from(body.to_string())));
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Requests that reached the network for `path`, offline ones included.
    pub(crate) fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        *self.calls.lock().unwrap().entry(request.path().to_string()).or_default() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::HttpError(format!("network error: {} unreachable", request.url)));
        }

        let route = self.routes.lock().unwrap().get(request.path()).cloned();
        let (status, body) = route.unwrap_or((StatusCode::NOT_FOUND, Bytes::from_static(b"{\"error\":\"not found\"}")));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(ApiResponse { status, headers, body })
    }
}
