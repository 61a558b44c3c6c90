//! Store configuration loader.
//!
//! Reads `agentdb.toml` from the data directory (`~/.agentdb/` in production)
//! and deserializes it into [`StoreConfig`]. A missing file means defaults;
//! a file that exists but cannot be read or parsed is an error, so a typo
//! never silently produces a store with the wrong dimension.

use std::path::Path;

use agentdb_types::config::StoreConfig;
use agentdb_types::error::ConfigError;

use crate::filesystem::config_path;

/// Load the store configuration from `{data_dir}/agentdb.toml`.
///
/// - If the file does not exist, returns [`StoreConfig::default()`].
/// - If the file cannot be read or parsed, returns the error.
/// - The parsed config is validated before it is returned.
pub async fn load_store_config(data_dir: &Path) -> Result<StoreConfig, ConfigError> {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No agentdb.toml found at {}, using defaults", path.display());
            return Ok(StoreConfig::default());
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}", path.display());
            return Err(ConfigError::Io(format!("{}: {err}", path.display())));
        }
    };

    let config = parse_store_config(&content)?;
    tracing::debug!(
        db_name = %config.db_name,
        vector_dim = config.vector_dim,
        "loaded {}",
        path.display()
    );
    Ok(config)
}

/// Parse and validate a TOML document.
pub fn parse_store_config(content: &str) -> Result<StoreConfig, ConfigError> {
    let config: StoreConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Write `config` as `{data_dir}/agentdb.toml`, creating the directory.
pub async fn save_store_config(data_dir: &Path, config: &StoreConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| ConfigError::Io(e.to_string()))?;
    tokio::fs::write(config_path(data_dir), content)
        .await
        .map_err(|e| ConfigError::Io(e.to_string()))
}
