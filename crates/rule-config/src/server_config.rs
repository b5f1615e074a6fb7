//! Host process configuration
//!
//! ```yaml
//! engine:
//!   handler_timeout: "00:00:30"
//!   type_tags:
//!     - name: percent
//!       kind: integer
//! storage:
//!   path: /var/lib/rules
//! logger:
//!   default: info
//! rules: !include_dir_merge_list rules
//! ```

use rule_core::Rule;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::duration::option_duration_serde;
use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for a single handler call; none by default
    #[serde(default, with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub handler_timeout: Option<Duration>,

    /// Value type tags beyond the built-in ones, for connection checks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_tags: Vec<TypeTagConfig>,
}

/// A custom value type tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeTagConfig {
    pub name: String,
    /// Structural kind: any, text, boolean, integer, decimal, number, object or list
    pub kind: String,
    /// Tag this one refines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for rule files; rules are kept in memory only when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Default level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub default: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level configuration of the rule engine host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    /// Rules added at startup
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl ServerConfig {
    /// Load from `file`, resolving includes relative to `config_dir`
    pub fn load(config_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let mut config = Self::from_yaml(load_yaml(config_dir, file)?)?;

        if let Some(path) = config.storage.path.as_mut() {
            if path.is_relative() {
                *path = config_dir.join(&*path);
            }
        }
        Ok(config)
    }

    /// Parse an already tag-processed YAML document
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(value: Value) -> ConfigResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        if !value.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "<root>".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }

        serde_yaml::from_value(value).map_err(|e| ConfigError::InvalidValue {
            key: "<root>".to_string(),
            reason: e.to_string(),
        })
    }
}
