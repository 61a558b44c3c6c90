//! Application state for one CLI invocation.
//!
//! Resolves the data directory, loads `agentdb.toml`, and opens the
//! database from its snapshot (or empty when none exists yet).

use std::path::PathBuf;

use anyhow::Context;

use agentdb_core::db::AgentDb;
use agentdb_infra::config::load_store_config;
use agentdb_infra::filesystem::{resolve_data_dir, snapshot_path};
use agentdb_infra::snapshot::{open_or_create, save_snapshot};

pub struct AppState {
    pub db: AgentDb,
    pub data_dir: PathBuf,
    pub snapshot_path: PathBuf,
}

impl AppState {
    /// Open the database under `data_dir`, or the resolved default.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);

        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config = load_store_config(&data_dir)
            .await
            .context("failed to load agentdb.toml")?;
        let snapshot_path = snapshot_path(&data_dir, &config.db_name);
        let db = open_or_create(&snapshot_path, config)
            .await
            .with_context(|| format!("failed to open {}", snapshot_path.display()))?;

        tracing::debug!(data_dir = %data_dir.display(), "app state initialized");

        Ok(Self {
            db,
            data_dir,
            snapshot_path,
        })
    }

    /// Write the current contents back to the snapshot file.
    pub async fn persist(&self) -> anyhow::Result<()> {
        save_snapshot(&self.db, &self.snapshot_path)
            .await
            .with_context(|| format!("failed to save {}", self.snapshot_path.display()))
    }
}
