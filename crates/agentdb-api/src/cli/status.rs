//! Store statistics and configuration dashboards.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;

use agentdb_infra::config::save_store_config;
use agentdb_infra::filesystem::config_path;
use agentdb_types::config::StoreConfig;

use crate::state::AppState;

/// Display store statistics.
pub fn stats(state: &AppState, json: bool) -> Result<()> {
    let stats = state.db.get_stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let ready = if stats.initialized {
        style("● ready").green()
    } else {
        style("○ not initialized").yellow()
    };

    println!();
    println!(
        "  {} {}  {}",
        style("⚡").bold(),
        style(&stats.db_name).cyan().bold(),
        ready
    );
    println!();

    println!("  {}", style("── Experiences ──").dim());
    println!("  Total:    {}", style(stats.total_experiences).bold());
    println!("  Agents:   {}", stats.agent_count);
    println!("  Episodes: {}", stats.episodes_completed);
    println!();

    println!("  {}", style("── Index ──").dim());
    println!("  Kind:      {}", stats.index_kind);
    println!("  Metric:    {}", stats.metric);
    println!("  Dimension: {}", stats.vector_dim);
    println!();

    println!("  {}", style("── Memory ──").dim());
    let limit = stats
        .memory_limit_bytes
        .map(format_bytes)
        .unwrap_or_else(|| "unbounded".to_string());
    println!(
        "  Used: {} / {}",
        format_bytes(stats.memory_used_bytes),
        style(limit).dim()
    );
    println!();
    Ok(())
}

/// Display configuration and file locations.
pub fn info(state: &AppState, json: bool) -> Result<()> {
    let config = state.db.config();
    let config_file = config_path(&state.data_dir);

    if json {
        let info = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "config_file": config_file.display().to_string(),
            "snapshot_file": state.snapshot_path.display().to_string(),
            "state": state.db.state(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} AgentDB v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Files ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    let config_note = if config_file.exists() { "" } else { " (defaults)" };
    println!(
        "  Config:   {}{}",
        style(config_file.display()).dim(),
        config_note
    );
    println!("  Snapshot: {}", style(state.snapshot_path.display()).dim());
    println!();

    println!("  {}", style("── Store ──").dim());
    println!("  Name:      {}", style(&config.db_name).cyan());
    println!("  State:     {}", state.db.state());
    println!("  Dimension: {}", config.vector_dim);
    println!("  Metric:    {}", config.metric);
    println!("  Index:     {}", config.index);
    println!(
        "  Next-state index: {}",
        if config.index_next_state { "on" } else { "off" }
    );
    println!("  Eviction:  {}", config.eviction);
    println!();
    Ok(())
}

/// Write `config` as the data directory's agentdb.toml.
///
/// Refuses to replace an existing file unless `force` is set, since a new
/// dimension or metric makes the existing snapshot unloadable.
pub async fn init(data_dir: &Path, config: StoreConfig, force: bool, json: bool) -> Result<()> {
    config.validate().context("invalid store configuration")?;

    let path = config_path(data_dir);
    if path.exists() && !force {
        bail!(
            "{} already exists; re-run with --force to overwrite",
            path.display()
        );
    }

    save_store_config(data_dir, &config)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(db_name = %config.db_name, path = %path.display(), "store config written");

    if json {
        let written = serde_json::json!({
            "config_file": path.display().to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&written)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Wrote {}",
        style("✓").green().bold(),
        style(path.display()).cyan()
    );
    println!(
        "  {} dims, {} metric, {} index",
        config.vector_dim, config.metric, config.index
    );
    println!();
    Ok(())
}

/// Format a byte count with binary units.
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdb_infra::config::load_store_config;
    use agentdb_types::config::IndexKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_writes_config_and_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let mut config = StoreConfig::new("replay", 6);
        config.index = IndexKind::Hnsw;

        init(tmp.path(), config.clone(), false, true).await.unwrap();
        assert_eq!(load_store_config(tmp.path()).await.unwrap(), config);

        let other = StoreConfig::new("other", 3);
        assert!(init(tmp.path(), other.clone(), false, true).await.is_err());
        assert_eq!(load_store_config(tmp.path()).await.unwrap(), config);

        init(tmp.path(), other.clone(), true, true).await.unwrap();
        assert_eq!(load_store_config(tmp.path()).await.unwrap(), other);
    }

    #[tokio::test]
    async fn init_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        assert!(init(tmp.path(), StoreConfig::new("db", 0), false, true).await.is_err());
        assert!(!config_path(tmp.path()).exists());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(64 * 1024 * 1024), "64.0 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
