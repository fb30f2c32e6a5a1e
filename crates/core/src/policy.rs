//! Per-endpoint freshness policies.
//!
//! Policies are looked up by exact request path. Paths without an entry get
//! the table's default TTL and are always cacheable.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path of the credential validation endpoint.
pub const AUTH_ENDPOINT: &str = "/lite/v1/auth";

/// Path of the base analytics endpoint.
pub const ANALYTICS_ENDPOINT: &str = "/lite/v1/analytics";

/// Path of the business analytics endpoint.
pub const BUSINESS_ANALYTICS_ENDPOINT: &str = "/lite/v1/analytics/business";

/// Freshness window for paths with no specific entry (5 minutes).
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Longest accepted freshness window (30 days).
pub const MAX_TTL_MS: u64 = 30 * 24 * 60 * 60 * 1000;

const HOUR_MS: u64 = 60 * 60 * 1000;

/// Freshness rule for a single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPolicy {
    /// Freshness window in milliseconds.
    pub ttl_ms: u64,

    /// Never read from or write to the store.
    #[serde(default)]
    pub bypass: bool,
}

impl EndpointPolicy {
    pub const fn cached(ttl_ms: u64) -> Self {
        Self { ttl_ms, bypass: false }
    }

    pub const fn bypassed(ttl_ms: u64) -> Self {
        Self { ttl_ms, bypass: true }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Whether an entry stored at `timestamp_ms` is still fresh at `now_ms`.
    pub fn is_fresh(&self, timestamp_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(timestamp_ms) <= self.ttl_signed()
    }

    /// Whether an entry of the given age has outlived the window.
    pub fn is_expired(&self, age_ms: i64) -> bool {
        age_ms > self.ttl_signed()
    }

    fn ttl_signed(&self) -> i64 {
        i64::try_from(self.ttl_ms).unwrap_or(i64::MAX)
    }
}

/// Exact-path policy table with a default TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    entries: BTreeMap<String, EndpointPolicy>,
    default_ttl_ms: u64,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new(default_policies(), DEFAULT_TTL_MS)
    }
}

impl PolicyTable {
    pub fn new(entries: BTreeMap<String, EndpointPolicy>, default_ttl_ms: u64) -> Self {
        Self { entries, default_ttl_ms }
    }

    /// Policy for `path`, falling back to the default TTL.
    pub fn lookup(&self, path: &str) -> EndpointPolicy {
        self.entries
            .get(path)
            .copied()
            .unwrap_or(EndpointPolicy::cached(self.default_ttl_ms))
    }

}

/// Built-in endpoint table.
pub fn default_policies() -> BTreeMap<String, EndpointPolicy> {
    BTreeMap::from([
        (AUTH_ENDPOINT.to_string(), EndpointPolicy::bypassed(24 * HOUR_MS)),
        (ANALYTICS_ENDPOINT.to_string(), EndpointPolicy::cached(6 * HOUR_MS)),
        (BUSINESS_ANALYTICS_ENDPOINT.to_string(), EndpointPolicy::cached(6 * HOUR_MS)),
    ])
}
