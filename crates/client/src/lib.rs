//! Client side of anacache.
//!
//! This crate provides the interception layer that fronts the analytics
//! API, the container that hosts it, and the control client used to
//! register the layer and administer its store.

pub mod container;
pub mod control;
pub mod fetch;
pub mod interceptor;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use container::{LayerContainer, Registration};
pub use control::ControlClient;
pub use fetch::{ApiRequest, ApiResponse, FetchConfig, HttpNetwork, Network, X_CACHE, X_CACHE_DATE};
pub use interceptor::{CacheOutcome, Interceptor, InterceptorConfig, LayerState};
pub use reqwest::{Method, StatusCode, Url};
pub use runtime::{LayerHandle, spawn_layer};
