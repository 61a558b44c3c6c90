//! JSON snapshot persistence for [`AgentDb`].
//!
//! A snapshot captures the store configuration and every experience in
//! insertion order. Its `digest` is the SHA-256 of the serialized
//! `experiences` array; loading recomputes it and refuses a mismatch.
//! Restoring re-inserts records oldest first, so insertion-order tie
//! breaking and per-agent ordering survive a save/load cycle.

use std::path::Path;

use agentdb_core::db::AgentDb;
use agentdb_types::config::StoreConfig;
use agentdb_types::error::SnapshotError;
use agentdb_types::experience::ExperienceRecord;
use agentdb_types::snapshot::{SNAPSHOT_VERSION, Snapshot};

use crate::hash::sha256_hex;

/// Digest of an experience list as stored in [`Snapshot::digest`].
pub fn experiences_digest(experiences: &[ExperienceRecord]) -> Result<String, SnapshotError> {
    let bytes = serde_json::to_vec(experiences)?;
    Ok(sha256_hex(&bytes))
}

/// Capture the current contents of `db`.
pub fn build_snapshot(db: &AgentDb) -> Result<Snapshot, SnapshotError> {
    let experiences = db.export_experiences()?;
    let digest = experiences_digest(&experiences)?;
    Ok(Snapshot {
        version: SNAPSHOT_VERSION,
        config: db.config().clone(),
        experiences,
        digest,
    })
}

/// Verify `snapshot` and rebuild a ready [`AgentDb`] from it.
pub fn restore_snapshot(snapshot: Snapshot) -> Result<AgentDb, SnapshotError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }

    let actual = experiences_digest(&snapshot.experiences)?;
    if actual != snapshot.digest {
        return Err(SnapshotError::IntegrityMismatch {
            expected: snapshot.digest,
            actual,
        });
    }

    let db = AgentDb::new(snapshot.config)?;
    db.initialize()?;
    for record in snapshot.experiences {
        db.insert_record(record)?;
    }
    Ok(db)
}

/// Write a snapshot of `db` to `path` as pretty JSON.
///
/// The file is written next to `path` first and renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
pub async fn save_snapshot(db: &AgentDb, path: &Path) -> Result<(), SnapshotError> {
    let snapshot = build_snapshot(db)?;
    let json = serde_json::to_string_pretty(&snapshot)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;

    tracing::debug!(
        path = %path.display(),
        experiences = snapshot.experiences.len(),
        "snapshot saved"
    );
    Ok(())
}

/// Read, verify and restore the snapshot at `path`.
pub async fn load_snapshot(path: &Path) -> Result<AgentDb, SnapshotError> {
    let content = tokio::fs::read_to_string(path).await?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    let count = snapshot.experiences.len();
    let db = restore_snapshot(snapshot)?;
    tracing::debug!(path = %path.display(), experiences = count, "snapshot loaded");
    Ok(db)
}

/// Load the snapshot at `path` if it exists, otherwise start an empty store
/// from `config`.
///
/// An existing snapshot keeps its own configuration; a differing `config`
/// is logged and ignored.
pub async fn open_or_create(path: &Path, config: StoreConfig) -> Result<AgentDb, SnapshotError> {
    if tokio::fs::try_exists(path).await? {
        let db = load_snapshot(path).await?;
        if db.config() != &config {
            tracing::warn!(
                path = %path.display(),
                "snapshot config differs from agentdb.toml, using snapshot config"
            );
        }
        return Ok(db);
    }

    let db = AgentDb::new(config)?;
    db.initialize()?;
    Ok(db)
}
