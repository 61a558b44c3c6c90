//! Data directory layout for AgentDB.
//!
//! ```text
//! {data_dir}/
//!   agentdb.toml               store configuration
//!   {db_name}.snapshot.json    persisted experiences
//! ```

use std::path::{Path, PathBuf};

/// Path of the configuration file inside `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("agentdb.toml")
}

/// Path of the snapshot file for `db_name` inside `data_dir`.
pub fn snapshot_path(data_dir: &Path, db_name: &str) -> PathBuf {
    data_dir.join(format!("{db_name}.snapshot.json"))
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `AGENTDB_DATA_DIR` environment variable
/// 2. `~/.agentdb` under the user's home directory
/// 3. `.agentdb` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTDB_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".agentdb");
    }

    PathBuf::from(".agentdb")
}
