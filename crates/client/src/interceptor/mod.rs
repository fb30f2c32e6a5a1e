//! The interception layer.
//!
//! Sits between callers and the analytics API. GET requests under the
//! monitored prefix are answered from the versioned store when fresh, fetched
//! and persisted when not, and served stale when the network lets us down.
//! The layer also answers control messages (clear all, clear one endpoint,
//! report status) and owns the store's install/activate lifecycle.

mod control;
mod handler;
mod inflight;
mod lifecycle;

use std::sync::{Arc, Mutex, MutexGuard};

use anacache_core::{AppConfig, CacheDb, Clock, Error, PolicyTable};
use reqwest::Url;

use crate::fetch::{Network, api_url};
use inflight::InflightRegistry;

pub use handler::CacheOutcome;
pub use lifecycle::LayerState;

/// Static settings of one layer generation.
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Versioned store name.
    pub cache_name: String,
    /// Only GET requests whose path starts with this are intercepted.
    pub api_prefix: String,
    pub policies: PolicyTable,
    /// Fetched into the store at install.
    pub precache: Vec<Url>,
    /// Coalesce concurrent misses for the same key into one fetch.
    pub coalesce_requests: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self {
            cache_name: app.cache_name,
            api_prefix: app.api_prefix,
            policies: PolicyTable::default(),
            precache: Vec::new(),
            coalesce_requests: false,
        }
    }
}

impl InterceptorConfig {
    /// Build from application config. Precache entries are API-relative
    /// paths resolved against `api_base_url`.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let precache = config
            .precache
            .iter()
            .map(|path| api_url(&config.api_base_url, path).map_err(Error::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            cache_name: config.cache_name.clone(),
            api_prefix: config.api_prefix.clone(),
            policies: config.policy_table(),
            precache,
            coalesce_requests: config.coalesce_requests,
        })
    }
}

/// One generation of the interception layer.
pub struct Interceptor {
    config: InterceptorConfig,
    storage: CacheDb,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    state: Mutex<LayerState>,
    inflight: InflightRegistry,
}

impl Interceptor {
    pub fn new(config: InterceptorConfig, storage: CacheDb, network: Arc<dyn Network>, clock: Arc<dyn Clock>) -> Self {
        Self { config, storage, network, clock, state: Mutex::new(LayerState::Installing), inflight: InflightRegistry::default() }
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn state(&self) -> LayerState {
        *self.lock_state()
    }

    fn set_state(&self, state: LayerState) {
        *self.lock_state() = state;
    }

    fn lock_state(&self) -> MutexGuard<'_, LayerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
