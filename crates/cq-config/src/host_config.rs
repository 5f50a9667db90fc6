//! Host configuration
//!
//! Parsed from `consequences.yaml` in the config directory. Every key is
//! optional; a missing file yields the defaults.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE: &str = "consequences.yaml";

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Directory holding persisted addon records, relative to the config
    /// directory unless absolute
    pub storage_dir: PathBuf,

    /// Maximum nesting depth of link evaluation
    pub max_link_depth: usize,

    /// Capacity of each event bus channel
    pub event_channel_capacity: usize,

    /// Default `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".storage"),
            max_link_depth: 64,
            event_channel_capacity: 1024,
            log_filter: "info".to_string(),
        }
    }
}

impl HostConfig {
    /// Load `consequences.yaml` from `config_dir`
    ///
    /// The returned `storage_dir` is resolved against `config_dir`.
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();

        let mut config = if config_dir.join(CONFIG_FILE).is_file() {
            Self::from_yaml(load_yaml(config_dir, CONFIG_FILE)?)?
        } else {
            debug!(config_dir = %config_dir.display(), "No configuration file, using defaults");
            Self::default()
        };

        if config.storage_dir.is_relative() {
            config.storage_dir = config_dir.join(&config.storage_dir);
        }
        Ok(config)
    }

    /// Parse configuration from an already loaded YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        let config: HostConfig = match yaml {
            Value::Null => HostConfig::default(),
            Value::Mapping(_) => {
                serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
                    key: "root".to_string(),
                    reason: e.to_string(),
                })?
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "root".to_string(),
                    reason: "configuration must be a mapping".to_string(),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_link_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_link_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "event_channel_capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
