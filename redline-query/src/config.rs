//! TOML configuration for the store, service, and provider credentials.
//!
//! Provider API keys are resolved here once at startup; providers that need
//! a key fail at construction time, not per call.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedlineConfig {
    pub store: StoreConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
    pub providers: ProviderConfig,
}

/// Parquet store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { dir: "data".into() }
    }
}

/// Connection pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout_ms: 5000,
        }
    }
}

/// Query cache sizing and freshness window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 64,
            ttl_seconds: 300,
        }
    }
}

/// Provider API keys (optional; keyless providers ignore them).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub alpha_vantage_key: Option<String>,
    pub finnhub_key: Option<String>,
}

impl RedlineConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: RedlineConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "pool.max_connections must be at least 1".into(),
            ));
        }
        if self.pool.acquire_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "pool.acquire_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RedlineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.store.dir, PathBuf::from("data"));
        assert!(config.providers.alpha_vantage_key.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let config: RedlineConfig = toml::from_str(
            r#"
            [pool]
            max_connections = 8

            [providers]
            finnhub_key = "tok"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.max_connections, 8);
        assert_eq!(config.pool.acquire_timeout_ms, 5000); // default retained
        assert_eq!(config.providers.finnhub_key.as_deref(), Some("tok"));
    }

    #[test]
    fn zero_pool_size_is_invalid() {
        let config: RedlineConfig = toml::from_str("[pool]\nmax_connections = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RedlineConfig::load(Path::new("/nonexistent/redline.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
