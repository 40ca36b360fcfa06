//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SITECACHE_*)
//! 2. TOML config file (if SITECACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! List fields take figment's array syntax from the environment, e.g.
//! `SITECACHE_BYPASS_HOSTS='["cdn.jsdelivr.net", "unpkg.com"]'`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Assets every install must fetch and store.
pub const DEFAULT_CRITICAL_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/offline.html",
    "/css/main.css",
    "/css/fontawesome-subset.css",
    "/js/main.js",
    "/js/utils.js",
    "/js/ui.js",
    "/js/animations.js",
    "/js/error-handler.js",
    "/js/projects.js",
    "/js/keyboard-nav.js",
    "/images/avatar.webp",
    "/images/cloudycode-light.webp",
    "/images/loading.svg",
    "/images/favicon.svg",
    "/manifest.json",
];

/// Third-party hosts that are always fetched fresh and never stored.
pub const DEFAULT_BYPASS_HOSTS: &[&str] = &["cdn.jsdelivr.net", "fonts.googleapis.com", "fonts.gstatic.com"];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SITECACHE_*)
/// 2. TOML config file (if SITECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via SITECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the controller governs; manifest paths resolve against it.
    ///
    /// Set via SITECACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Store name prefix; also the registration scope.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag. Changing it invalidates every previously stored asset.
    ///
    /// Set via SITECACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Path served for failed navigations. Must be a critical asset.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Paths fetched and stored on install.
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<String>,

    /// Hosts whose requests always go to the network and are never stored.
    #[serde(default = "default_bypass_hosts")]
    pub bypass_hosts: Vec<String>,

    /// Activate right after install even if another version is active.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SITECACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sitecache.sqlite")
}

fn default_origin() -> String {
    "https://cloudycode.dev".into()
}

fn default_cache_prefix() -> String {
    "cloudycode".into()
}

fn default_version() -> String {
    "v6.2.9".into()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_critical_assets() -> Vec<String> {
    DEFAULT_CRITICAL_ASSETS.iter().map(|s| s.to_string()).collect()
}

fn default_bypass_hosts() -> Vec<String> {
    DEFAULT_BYPASS_HOSTS.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "sitecache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            offline_page: default_offline_page(),
            critical_assets: default_critical_assets(),
            bypass_hosts: default_bypass_hosts(),
            skip_waiting_on_install: true,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the store owned by the configured version.
    pub fn store_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment()
            .extract::<Self>()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))
            .and_then(|config| config.validate().map(|_| config))
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SITECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("SITECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
