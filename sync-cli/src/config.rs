//! Configuration loading for offline-sync.
//!
//! Configuration is loaded from a TOML file (default:
//! `<data-dir>/offline-sync.toml`). Every section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use sync_client::{CleanupConfig, SyncConfig};
use sync_store::StoreConfig;

/// File name looked up in the data directory when `--config` is not given.
pub const CONFIG_FILE: &str = "offline-sync.toml";

/// Root configuration for the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Sync manager configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load the explicit `path`, or the data directory's config file if it
    /// exists, or fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a file was found but could not be read or parsed,
    /// or if an explicit `path` does not exist.
    pub fn resolve(path: Option<&Path>, data_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let default_path = data_dir.join(CONFIG_FILE);
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            tracing::debug!(path = %default_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.sync.batch_size, 5);
        assert_eq!(config.store.namespace, "offline_sync:");
        assert!(config.cleanup.enabled);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[sync]
batch_size = 2
request_timeout_ms = 5000
invalidation_resources = ["teachers", "analytics"]

[store]
namespace = "school:"
cache_ttl_secs = 60

[cleanup]
interval_secs = 1800
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sync.batch_size, 2);
        assert_eq!(config.sync.request_timeout_ms, 5000);
        assert_eq!(config.sync.invalidation_resources, vec!["teachers", "analytics"]);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.store.namespace, "school:");
        assert_eq!(config.store.cache_prefix, "cache:");
        assert_eq!(config.cleanup.interval_secs, 1800);
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: Config = toml::from_str("[store]\ncache_prefix = \"c:\"\n").unwrap();
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.store.cache_prefix, "c:");
        assert_eq!(config.cleanup, CleanupConfig::default());
    }

    #[test]
    fn resolve_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::resolve(None, dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn resolve_picks_up_data_dir_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[sync]\nmax_attempts = 9\n").unwrap();

        let config = Config::resolve(None, dir.path()).unwrap();
        assert_eq!(config.sync.max_attempts, 9);
    }

    #[test]
    fn missing_explicit_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = Config::resolve(Some(&dir.path().join("nope.toml")), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[sync\nbatch_size = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
