//! YAML configuration loading for Consequences
//!
//! This crate loads the host configuration with support for two custom
//! tags:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var NAME [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use cq_config::HostConfig;
//!
//! let config = HostConfig::load("/config")?;
//! ```

mod error;
mod host_config;
mod loader;

pub use error::{ConfigError, ConfigResult};
pub use host_config::{HostConfig, CONFIG_FILE};
pub use loader::{load_yaml, YamlLoader};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
