//! SQLite-backed, versioned cache storage.
//!
//! The database holds any number of named caches. Each name is one
//! generation of the interception layer's store; a new deployment uses a new
//! name and sweeps the old ones on activation. It supports:
//!
//! - Entries keyed by SHA-256 of request method and absolute URL
//! - Metadata embedded in the stored JSON payload
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entry;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::{CACHE_METADATA_FIELD, CacheMetadata, StoredEntry};
