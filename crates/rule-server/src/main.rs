//! Rule engine host
//!
//! Usage: `rule-engine [CONFIG]` where `CONFIG` defaults to `rules.yaml`.
//! Includes in the configuration resolve relative to its directory.

mod host;

use anyhow::{Context as _, Result};
use rule_config::ServerConfig;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::host::RuleHost;

const DEFAULT_CONFIG: &str = "rules.yaml";

fn load_config(path: &Path) -> Result<ServerConfig> {
    if !path.exists() {
        return Ok(ServerConfig::default());
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = path.file_name().context("configuration path has no file name")?;
    ServerConfig::load(dir, file).with_context(|| format!("loading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = load_config(&config_path)?;

    // RUST_LOG wins over the configured default level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logger.default))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(config = %config_path.display(), "Starting rule engine");

    let host = RuleHost::start(&config).await?;

    info!("Rule engine is running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    host.shutdown();
    Ok(())
}
