//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ANACACHE_*)
//! 2. TOML config file (if ANACACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::policy::{self, EndpointPolicy, PolicyTable};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ANACACHE_*)
/// 2. TOML config file (if ANACACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the analytics API, e.g. `https://analytics.example.com`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Path prefix whose GET requests are intercepted.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Versioned store name. Changing it makes activation sweep the old store.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body bytes accepted from the API.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Freshness window for paths without a policy entry.
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Exact-path endpoint policies.
    #[serde(default = "policy::default_policies")]
    pub policies: BTreeMap<String, EndpointPolicy>,

    /// Static resources fetched into the store when the layer installs.
    #[serde(default)]
    pub precache: Vec<String>,

    /// How long the control client waits for a reply from the layer.
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,

    /// Share one network fetch between concurrent misses for the same key.
    #[serde(default)]
    pub coalesce_requests: bool,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_api_prefix() -> String {
    "/lite/v1/".into()
}

fn default_cache_name() -> String {
    "analytics-cache-v1".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./anacache.sqlite")
}

fn default_user_agent() -> String {
    "anacache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_ttl_ms() -> u64 {
    policy::DEFAULT_TTL_MS
}

fn default_control_timeout_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_prefix: default_api_prefix(),
            cache_name: default_cache_name(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            default_ttl_ms: default_ttl_ms(),
            policies: policy::default_policies(),
            precache: Vec::new(),
            control_timeout_ms: default_control_timeout_ms(),
            coalesce_requests: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Control reply deadline as Duration.
    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    /// Policy table built from `policies` and `default_ttl_ms`.
    pub fn policy_table(&self) -> PolicyTable {
        PolicyTable::new(self.policies.clone(), self.default_ttl_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ANACACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(Env::prefixed("ANACACHE_").ignore(&["config_file"])))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_prefix, "/lite/v1/");
        assert_eq!(config.cache_name, "analytics-cache-v1");
        assert_eq!(config.db_path, PathBuf::from("./anacache.sqlite"));
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.default_ttl_ms, 300_000);
        assert_eq!(config.control_timeout_ms, 5_000);
        assert!(config.precache.is_empty());
        assert!(!config.coalesce_requests);
        assert_eq!(config.policies.len(), 3);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.control_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_policy_table_uses_default_ttl() {
        let config = AppConfig { default_ttl_ms: 1_000, ..Default::default() };
        let table = config.policy_table();
        assert_eq!(table.lookup("/lite/v1/unknown").ttl_ms, 1_000);
        assert!(table.lookup(policy::AUTH_ENDPOINT).bypass);
    }

    #[test]
    fn test_toml_layer_overrides_policies() {
        let toml = r#"
            cache_name = "analytics-cache-v2"
            coalesce_requests = true

            [policies."/lite/v1/analytics"]
            ttl_ms = 60000

            [policies."/lite/v1/auth"]
            ttl_ms = 1000
            bypass = true
        "#;
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(toml));
        let config = AppConfig::extract(figment).unwrap();

        assert_eq!(config.cache_name, "analytics-cache-v2");
        assert!(config.coalesce_requests);
        let table = config.policy_table();
        assert_eq!(table.lookup("/lite/v1/analytics").ttl_ms, 60_000);
        assert!(table.lookup("/lite/v1/auth").bypass);
    }
}
