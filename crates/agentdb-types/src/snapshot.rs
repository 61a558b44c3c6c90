//! On-disk snapshot format.
//!
//! A snapshot holds the store configuration and every experience in
//! insertion order. `digest` is the lowercase hex SHA-256 of the serialized
//! `experiences` array and is checked on load.

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::experience::ExperienceRecord;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub config: StoreConfig,
    /// Oldest first.
    pub experiences: Vec<ExperienceRecord>,
    pub digest: String,
}
