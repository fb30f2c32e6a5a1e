//! Page-side control client.
//!
//! Registers the interception layer and talks to it over the message
//! channel. Every public operation degrades to a boolean or an empty list on
//! failure and logs the cause, so callers can fire and forget.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anacache_core::{AppConfig, CacheStatusEntry, ControlReply, ControlRequest, Error};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::container::{LayerContainer, Registration};
use crate::fetch::{ApiRequest, ApiResponse};

/// Scope the layer is registered under.
pub const SCOPE: &str = "/";

pub struct ControlClient {
    container: Arc<LayerContainer>,
    registration: Mutex<Option<Registration>>,
    reply_timeout: Duration,
}

impl ControlClient {
    pub fn new(container: Arc<LayerContainer>, reply_timeout: Duration) -> Self {
        Self { container, registration: Mutex::new(None), reply_timeout }
    }

    pub fn from_config(container: Arc<LayerContainer>, config: &AppConfig) -> Self {
        Self::new(container, config.control_timeout())
    }

    /// Register the layer at [`SCOPE`]. False on failure.
    pub async fn register(&self) -> bool {
        match self.container.register(SCOPE).await {
            Ok(registration) => {
                info!(scope = %registration.scope, cache = %registration.cache_name, "control client registered");
                *self.lock_registration() = Some(registration);
                true
            }
            Err(err) => {
                error!(error = %err, "interception layer registration failed");
                false
            }
        }
    }

    /// Unregister the layer. False when nothing was registered.
    pub async fn unregister(&self) -> bool {
        let unregistered = self.container.unregister().await;
        self.lock_registration().take();
        if unregistered {
            info!("interception layer unregistered");
        }
        unregistered
    }

    pub fn is_registered(&self) -> bool {
        self.lock_registration().is_some()
    }

    pub fn registration(&self) -> Option<Registration> {
        self.lock_registration().clone()
    }

    /// Post a control request to the controlling layer and wait for the
    /// reply, bounded by the configured timeout.
    pub async fn send_message(&self, request: &ControlRequest) -> Result<ControlReply, Error> {
        let controller = self.container.controller().await.ok_or(Error::NoController)?;
        let rx = controller.post_message(request.to_message()).await?;
        let reply = await_reply(rx, self.reply_timeout).await?;

        match ControlReply::from_message(reply)? {
            ControlReply::Error { error } => Err(Error::ControlRejected(error)),
            reply => Ok(reply),
        }
    }

    /// Clear every store. The layer is asked first when one is active; the
    /// stores are then deleted directly regardless.
    pub async fn clear_cache(&self) -> bool {
        if self.container.controller().await.is_some()
            && let Err(err) = self.send_message(&ControlRequest::ClearCache).await
        {
            warn!(error = %err, "layer did not confirm cache clear");
        }

        match self.container.clear_all_storage().await {
            Ok(deleted) => {
                info!(deleted, "all caches cleared");
                true
            }
            Err(err) => {
                error!(error = %err, "failed to clear caches");
                false
            }
        }
    }

    /// Remove stored responses for exactly `endpoint`.
    pub async fn clear_endpoint_cache(&self, endpoint: &str) -> bool {
        match self.send_message(&ControlRequest::clear_endpoint(endpoint)).await {
            Ok(ControlReply::Ack { success }) => success,
            Ok(other) => {
                warn!(reply = ?other, "unexpected reply to endpoint clear");
                false
            }
            Err(err) => {
                error!(endpoint, error = %err, "failed to clear endpoint cache");
                false
            }
        }
    }

    /// Freshness of every stored response; empty on any failure.
    pub async fn get_cache_status(&self) -> Vec<CacheStatusEntry> {
        match self.send_message(&ControlRequest::GetCacheStatus).await {
            Ok(ControlReply::Status { status }) => status,
            Ok(other) => {
                warn!(reply = ?other, "unexpected reply to status request");
                Vec::new()
            }
            Err(err) => {
                error!(error = %err, "failed to get cache status");
                Vec::new()
            }
        }
    }

    /// Perform a request through the container.
    pub async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.container.fetch(request).await
    }

    pub fn container(&self) -> &LayerContainer {
        &self.container
    }

    fn lock_registration(&self) -> std::sync::MutexGuard<'_, Option<Registration>> {
        self.registration.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wait for a posted reply, failing with `ControlTimeout` after `timeout`.
async fn await_reply(rx: oneshot::Receiver<Value>, timeout: Duration) -> Result<Value, Error> {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(_)) => Err(Error::ControlClosed),
        Err(_) => Err(Error::ControlTimeout(timeout.as_millis() as u64)),
    }
}
