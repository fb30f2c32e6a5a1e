//! The container that an interception layer controls.
//!
//! Owns the shared store, the network and the currently active layer
//! generation. Registering installs and activates a fresh generation, then
//! swaps it in and retires the previous one. Requests made through the
//! container are routed through the active layer when there is one and go
//! straight to the network otherwise.

use std::sync::Arc;

use anacache_core::{CacheDb, Clock, Error};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::fetch::{ApiRequest, ApiResponse, Network};
use crate::interceptor::{Interceptor, InterceptorConfig, LayerState};
use crate::runtime::{LayerHandle, LayerTask, spawn_layer};

/// Record of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub scope: String,
    pub cache_name: String,
    pub registered_at: DateTime<Utc>,
}

struct ActiveLayer {
    interceptor: Arc<Interceptor>,
    handle: LayerHandle,
    task: LayerTask,
}

pub struct LayerContainer {
    storage: CacheDb,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    config: InterceptorConfig,
    active: Mutex<Option<ActiveLayer>>,
}

impl LayerContainer {
    pub fn new(storage: CacheDb, network: Arc<dyn Network>, clock: Arc<dyn Clock>, config: InterceptorConfig) -> Self {
        Self { storage, network, clock, config, active: Mutex::new(None) }
    }

    /// Install, activate and start a new layer generation under `scope`.
    ///
    /// On install failure the previous generation stays in control.
    pub async fn register(&self, scope: &str) -> Result<Registration, Error> {
        if !scope.starts_with('/') {
            return Err(Error::InvalidInput(format!("scope must start with '/': {scope}")));
        }

        let interceptor = Arc::new(Interceptor::new(
            self.config.clone(),
            self.storage.clone(),
            self.network.clone(),
            self.clock.clone(),
        ));
        interceptor.install().await?;

        let mut active = self.active.lock().await;
        interceptor.activate().await?;
        let (handle, task) = spawn_layer(interceptor.clone());
        let previous = active.replace(ActiveLayer { interceptor, handle, task });
        drop(active);

        if let Some(previous) = previous {
            previous.task.retire().await;
        }

        let registration = Registration {
            scope: scope.to_string(),
            cache_name: self.config.cache_name.clone(),
            registered_at: Utc::now(),
        };
        info!(scope = %registration.scope, cache = %registration.cache_name, "interception layer registered");
        Ok(registration)
    }

    /// Retire the active generation. Stored entries are kept.
    pub async fn unregister(&self) -> bool {
        let previous = self.active.lock().await.take();
        match previous {
            Some(layer) => {
                layer.task.retire().await;
                info!(cache = %layer.handle.cache_name(), "interception layer unregistered");
                true
            }
            None => false,
        }
    }

    /// Handle of the controlling layer, if any.
    pub async fn controller(&self) -> Option<LayerHandle> {
        self.active.lock().await.as_ref().map(|layer| layer.handle.clone())
    }

    /// Lifecycle state of the controlling layer, if any.
    pub async fn controller_state(&self) -> Option<LayerState> {
        self.active.lock().await.as_ref().map(|layer| layer.interceptor.state())
    }

    /// Perform a request as a page in this container would.
    pub async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        match self.controller().await {
            Some(handle) => handle.fetch(request).await,
            None => self.network.fetch(&request).await,
        }
    }

    pub fn storage(&self) -> &CacheDb {
        &self.storage
    }

    /// Delete every named store directly, without going through a layer.
    ///
    /// Returns the number of stores deleted.
    pub async fn clear_all_storage(&self) -> Result<usize, Error> {
        let mut deleted = 0;
        for name in self.storage.cache_names().await? {
            match self.storage.delete_cache(&name).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(cache = %name, error = %err, "cache deletion failed");
                    return Err(err);
                }
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use anacache_core::ManualClock;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::testing::{ScriptedNetwork, api};

    async fn container_with(config: InterceptorConfig) -> (Arc<ScriptedNetwork>, LayerContainer) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        let container = LayerContainer::new(db, network.clone(), Arc::new(ManualClock::new(0)), config);
        (network, container)
    }

    #[tokio::test]
    async fn test_register_takes_control() {
        let (network, container) = container_with(InterceptorConfig::default()).await;
        assert!(container.controller().await.is_none());

        let registration = container.register("/").await.unwrap();
        assert_eq!(registration.scope, "/");
        assert_eq!(registration.cache_name, "analytics-cache-v1");
        assert_eq!(container.controller_state().await, Some(LayerState::Active));

        network.respond_json("/lite/v1/analytics", json!({ "v": 1 }));
        container.fetch(ApiRequest::get(api("/lite/v1/analytics"))).await.unwrap();
        let hit = container.fetch(ApiRequest::get(api("/lite/v1/analytics"))).await.unwrap();
        assert_eq!(hit.cache_status(), Some("HIT"));
    }

    #[tokio::test]
    async fn test_register_rejects_relative_scope() {
        let (_, container) = container_with(InterceptorConfig::default()).await;
        assert!(matches!(container.register("app").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_reregister_replaces_controller() {
        let (_, container) = container_with(InterceptorConfig::default()).await;
        container.register("/").await.unwrap();
        let first = container.controller().await.unwrap();

        container.register("/").await.unwrap();
        assert!(first.is_closed());
        assert!(!container.controller().await.unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_controller() {
        let config = InterceptorConfig { precache: vec![api("/lite/v1/manifest.json")], ..Default::default() };
        let (network, container) = container_with(config).await;
        network.respond_json("/lite/v1/manifest.json", json!({}));
        container.register("/").await.unwrap();

        network.respond_status("/lite/v1/manifest.json", StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(container.register("/").await, Err(Error::InstallFailed(_))));
        assert!(!container.controller().await.unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_unregister_falls_back_to_network() {
        let (network, container) = container_with(InterceptorConfig::default()).await;
        network.respond_json("/lite/v1/analytics", json!({ "v": 1 }));
        container.register("/").await.unwrap();
        container.fetch(ApiRequest::get(api("/lite/v1/analytics"))).await.unwrap();

        assert!(container.unregister().await);
        assert!(!container.unregister().await);

        let response = container.fetch(ApiRequest::get(api("/lite/v1/analytics"))).await.unwrap();
        assert!(response.cache_status().is_none());
        assert_eq!(network.calls("/lite/v1/analytics"), 2);
        assert_eq!(container.storage().total_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_storage() {
        let (_, container) = container_with(InterceptorConfig::default()).await;
        container.storage().open_cache("a").await.unwrap();
        container.storage().open_cache("b").await.unwrap();

        assert_eq!(container.clear_all_storage().await.unwrap(), 2);
        assert!(container.storage().cache_names().await.unwrap().is_empty());
    }
}
