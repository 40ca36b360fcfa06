//! Configuration validation rules.
//!
//! Run after `AppConfig` has been loaded from environment, files, or
//! defaults, before a controller is built from it.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for an empty manifest and
    /// `ConfigError::Invalid` if:
    /// - `cache_prefix`, `version` or `user_agent` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - an asset path or `offline_page` does not start with `/`
    /// - `offline_page` is not one of the critical assets
    /// - `timeout_ms` is outside 100ms..=5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_prefix.trim().is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(invalid("version", "must not be empty"));
        }
        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.host_str().is_some() => {}
            Ok(origin) => return Err(invalid("origin", format!("unsupported origin: {origin}"))),
            Err(e) => return Err(invalid("origin", e.to_string())),
        }

        if self.critical_assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "critical_assets".into(),
                hint: "list at least the offline page".into(),
            });
        }
        if let Some(path) = self.critical_assets.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("critical_assets", format!("path must start with '/': {path}")));
        }
        if !self.offline_page.starts_with('/') {
            return Err(invalid("offline_page", "must start with '/'"));
        }
        if !self.critical_assets.contains(&self.offline_page) {
            return Err(invalid("offline_page", "must be listed in critical_assets"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.bypass_hosts.iter().any(|h| h.trim().is_empty()) {
            tracing::warn!("empty entry in bypass_hosts is ignored");
        }

        Ok(())
    }
}
