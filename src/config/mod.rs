//! Configuration management for Tracker
//!
//! Configuration is loaded with the following priority: an explicit TOML
//! file, `TRACKER_*` environment variable overrides, then built-in defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub storage: StorageConfig,
    pub writeback: WritebackConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Tokens longer than this are truncated before indexing and matching
    pub max_word_length: usize,
    /// Tokens shorter than this are rejected
    pub min_word_length: usize,
    /// Extra stop words on top of the built-in list
    pub stop_words: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_word_length: 30,
            min_word_length: 3,
            stop_words: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WritebackConfig {
    /// Seconds of idleness after which the writeback controller exits.
    /// Zero disables the idle timer.
    pub shutdown_timeout: u64,
    /// Maximum number of update operations running at once
    pub max_workers: usize,
}

impl Default for WritebackConfig {
    fn default() -> Self {
        WritebackConfig {
            shutdown_timeout: 30,
            max_workers: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_from_toml(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
    let config: Config =
        toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
    Ok(config)
}

/// Apply `TRACKER_*` environment variable overrides
fn apply_env_overrides(config: &mut Config) {
    if let Ok(value) = std::env::var("TRACKER_DATA_DIR") {
        config.storage.data_dir = value;
    }
    if let Ok(value) = std::env::var("TRACKER_MAX_WORD_LENGTH") {
        if let Ok(parsed) = value.parse() {
            config.search.max_word_length = parsed;
        }
    }
    if let Ok(value) = std::env::var("TRACKER_MIN_WORD_LENGTH") {
        if let Ok(parsed) = value.parse() {
            config.search.min_word_length = parsed;
        }
    }
    if let Ok(value) = std::env::var("TRACKER_SHUTDOWN_TIMEOUT") {
        if let Ok(parsed) = value.parse() {
            config.writeback.shutdown_timeout = parsed;
        }
    }
    if let Ok(value) = std::env::var("TRACKER_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Load configuration with fallback priority:
/// 1. Explicit config file
/// 2. Default config file (`tracker.toml` in the working directory)
/// 3. Built-in defaults
///
/// Environment variables override whichever source was used.
pub fn load(config_file: Option<&str>) -> Result<Config> {
    let mut config = if let Some(path) = config_file {
        load_from_toml(path)?
    } else if Path::new("tracker.toml").exists() {
        load_from_toml("tracker.toml")?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search.max_word_length, 30);
        assert_eq!(config.search.min_word_length, 3);
        assert_eq!(config.writeback.shutdown_timeout, 30);
        assert_eq!(config.storage.data_dir, "./data");
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            "[search]\n\
             min_word_length = 2\n",
        )
        .unwrap();
        assert_eq!(config.search.min_word_length, 2);
        assert_eq!(config.search.max_word_length, 30);
        assert_eq!(config.writeback.max_workers, 4);
    }
}
