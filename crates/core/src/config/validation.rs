//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::policy::MAX_TTL_MS;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `api_base_url` is not an http(s) URL
    /// - `api_prefix` does not start with `/`
    /// - `cache_name` or `user_agent` is empty
    /// - `timeout_ms` is outside 100ms..=5min
    /// - `control_timeout_ms` is outside 10ms..=1min
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `default_ttl_ms` or a non-bypass policy TTL is 0
    /// - `default_ttl_ms` or any policy TTL exceeds 30 days
    /// - a policy path does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(invalid("api_base_url", "must be an http(s) URL"));
        }

        if !self.api_prefix.starts_with('/') {
            return Err(invalid("api_prefix", "must start with '/'"));
        }

        if self.cache_name.trim().is_empty() {
            return Err(invalid("cache_name", "must not be empty"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.control_timeout_ms < 10 || self.control_timeout_ms > 60_000 {
            return Err(invalid("control_timeout_ms", "must be between 10ms and 60000ms"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.default_ttl_ms == 0 {
            return Err(invalid("default_ttl_ms", "must be greater than 0"));
        }
        if self.default_ttl_ms > MAX_TTL_MS {
            return Err(invalid("default_ttl_ms", "must not exceed 30 days"));
        }

        for (path, policy) in &self.policies {
            if !path.starts_with('/') {
                return Err(invalid(format!("policies.{path}"), "path must start with '/'"));
            }
            if !policy.bypass && policy.ttl_ms == 0 {
                return Err(invalid(format!("policies.{path}"), "ttl_ms must be greater than 0"));
            }
            if policy.ttl_ms > MAX_TTL_MS {
                return Err(invalid(format!("policies.{path}"), "ttl_ms must not exceed 30 days"));
            }
            if !path.starts_with(&self.api_prefix) {
                tracing::warn!(path = %path, prefix = %self.api_prefix, "policy path is outside the intercepted prefix");
            }
        }

        Ok(())
    }
}
