//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (REELCACHE_*)
//! 2. TOML config file (if REELCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::install::InstallPolicy;
use crate::version::{CacheVersion, PrecacheManifest, default_precache_paths};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (REELCACHE_*)
/// 2. TOML config file (if REELCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via REELCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin that manifest paths and relative request URLs resolve against.
    ///
    /// Set via REELCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Store name prefix; the active store is `{cache_prefix}-{version_tag}`.
    ///
    /// Set via REELCACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag. Bump on every deploy that changes assets or policy.
    ///
    /// Set via REELCACHE_VERSION_TAG environment variable.
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// Absolute paths captured at install time.
    ///
    /// Set via REELCACHE_PRECACHE environment variable (`["/", "/index.html"]`).
    #[serde(default = "default_precache_paths")]
    pub precache: Vec<String>,

    /// Whether a failed precache blocks activation.
    ///
    /// Set via REELCACHE_REQUIRE_PRECACHE environment variable.
    #[serde(default)]
    pub require_precache: bool,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via REELCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via REELCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via REELCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    ///
    /// Set via REELCACHE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./reelcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "reelmind".into()
}

fn default_version_tag() -> String {
    "v1.0.0".into()
}

fn default_user_agent() -> String {
    "reelcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
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
            version_tag: default_version_tag(),
            precache: default_precache_paths(),
            require_precache: false,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `REELCACHE_`
    /// 2. TOML file from `REELCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("REELCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("REELCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Version of the store this process installs at boot.
    pub fn cache_version(&self) -> Result<CacheVersion, ConfigError> {
        CacheVersion::new(&self.cache_prefix, &self.version_tag)
            .map_err(|e| ConfigError::Invalid { field: "version_tag".into(), reason: e.to_string() })
    }

    pub fn manifest(&self) -> Result<PrecacheManifest, ConfigError> {
        PrecacheManifest::new(self.precache.iter().cloned())
            .map_err(|e| ConfigError::Invalid { field: "precache".into(), reason: e.to_string() })
    }

    pub fn install_policy(&self) -> InstallPolicy {
        InstallPolicy { require_precache: self.require_precache }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./reelcache.sqlite"));
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.version_tag, "v1.0.0");
        assert_eq!(config.user_agent, "reelcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.precache.len(), 4);
        assert!(!config.require_precache);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_cache_version_from_config() {
        let config = AppConfig { version_tag: "v2.3.0".into(), ..Default::default() };
        assert_eq!(config.cache_version().unwrap().store_name(), "reelmind-v2.3.0");
    }

    #[test]
    fn test_install_policy_from_config() {
        let config = AppConfig { require_precache: true, ..Default::default() };
        assert!(config.install_policy().require_precache);
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("REELCACHE_VERSION_TAG", "v9.9.9");
            jail.set_env("REELCACHE_REQUIRE_PRECACHE", "true");
            jail.set_env("REELCACHE_PRECACHE", "[\"/\", \"/index.html\"]");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.version_tag, "v9.9.9");
            assert!(config.require_precache);
            assert_eq!(config.precache, vec!["/", "/index.html"]);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("reelcache.toml", "origin = \"https://app.reelmind.ai\"\nversion_tag = \"v1.1.0\"")?;
            jail.set_env("REELCACHE_CONFIG_FILE", "reelcache.toml");
            jail.set_env("REELCACHE_VERSION_TAG", "v1.2.0");
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.origin, "https://app.reelmind.ai");
            assert_eq!(config.version_tag, "v1.2.0");
            Ok(())
        });
    }
}
