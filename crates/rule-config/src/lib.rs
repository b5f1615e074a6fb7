//! YAML configuration loading for the rule engine host
//!
//! Supported custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_list dir` - Merge lists from all YAML files in a directory
//! - `!env_var NAME [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use rule_config::ServerConfig;
//!
//! let config = ServerConfig::load("/etc/rules", "rules.yaml")?;
//! ```

mod duration;
mod error;
mod loader;
mod server_config;

pub use duration::{format_duration, option_duration_serde, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use server_config::{
    EngineConfig, LoggerConfig, ServerConfig, StorageConfig, TypeTagConfig,
};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
