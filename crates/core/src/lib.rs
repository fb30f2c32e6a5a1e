//! Core types and shared functionality for anacache.
//!
//! This crate provides:
//! - Versioned cache storage with SQLite backend
//! - Endpoint freshness policies
//! - Control protocol messages
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod policy;
pub mod protocol;

pub use cache::{CACHE_METADATA_FIELD, CacheDb, CacheMetadata, StoredEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use policy::{EndpointPolicy, PolicyTable};
pub use protocol::{CacheStatusEntry, ControlReply, ControlRequest};
