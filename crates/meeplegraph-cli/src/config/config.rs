//! `AppConfig` struct and TOML loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use meeplegraph_api::bgg::ClientConfig;
use serde::Deserialize;

/// Default cache lifetime: 7 days.
const DEFAULT_CACHE_TTL_SECS: u64 = 604_800;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Retry, backoff and throttle settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Response cache configuration.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the cache database (default: `~/.cache/meeplegraph`).
    pub dir: Option<PathBuf>,
    /// Seconds a cached response stays valid.
    pub ttl_secs: u64,
    /// Set to `false` to always hit the network.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Cache lifetime as a `Duration`.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Applies a token from the environment, which overrides the file.
    #[must_use]
    pub fn with_env_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.client.api_token = Some(token);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_config() {
        // Arrange & Act
        let config = AppConfig::default();

        // Assert
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(604_800));
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\nmax_retries = 4\n\n[cache]\nenabled = false\n").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config.client.max_retries, 4);
        assert_eq!(config.client.timeout_secs, 30);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 604_800);
    }

    #[test]
    fn test_load_empty_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client\nmax_retries = ").unwrap();

        // Act
        let err = AppConfig::load(&path).unwrap_err();

        // Assert
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_env_token_overrides_file() {
        // Arrange
        let mut config = AppConfig::default();
        config.client.api_token = Some(String::from("from-file"));

        // Act
        let config = config.with_env_token(Some(String::from("from-env")));

        // Assert
        assert_eq!(config.client.api_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_blank_env_token_is_ignored() {
        // Arrange
        let mut config = AppConfig::default();
        config.client.api_token = Some(String::from("from-file"));

        // Act
        let config = config.with_env_token(Some(String::from("  ")));

        // Assert
        assert_eq!(config.client.api_token.as_deref(), Some("from-file"));
    }
}
