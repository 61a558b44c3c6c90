//! Experience types for AgentDB.
//!
//! An experience is one (state, action, reward, next-state, done) transition
//! recorded by an agent. Records are immutable once stored; replacing one
//! means deleting it and inserting a new record.

use std::collections::BTreeMap;
use std::mem::size_of;

use serde::{Deserialize, Serialize};

/// A stored experience transition.
///
/// Both vectors have exactly the store's configured `vector_dim` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    /// Unique within a store instance. Caller-supplied or store-generated.
    pub id: String,
    pub agent_id: String,
    pub state_vector: Vec<f32>,
    /// Open-vocabulary action label.
    pub action: String,
    pub reward: f64,
    pub next_state_vector: Vec<f32>,
    /// Marks the end of an episode.
    pub done: bool,
    /// Opaque to the store.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Caller-supplied; the store preserves insertion order, not timestamp order.
    pub timestamp: i64,
}

impl ExperienceRecord {
    /// Approximate heap + inline footprint of this record in bytes.
    ///
    /// Used for memory-bound accounting. Counts the record once; index copies
    /// of the vectors are accounted separately by the store.
    pub fn estimated_bytes(&self) -> usize {
        let metadata: usize = self
            .metadata
            .iter()
            .map(|(k, v)| k.len() + v.len() + 2 * size_of::<String>())
            .sum();

        size_of::<Self>()
            + self.id.len()
            + self.agent_id.len()
            + self.action.len()
            + (self.state_vector.len() + self.next_state_vector.len()) * size_of::<f32>()
            + metadata
    }
}

/// Caller input for a new experience.
///
/// The agent ID is supplied separately to `store_experience`. A missing `id`
/// is replaced by a generated time-sortable UUID; a missing `timestamp` by
/// the current Unix time in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewExperience {
    #[serde(default)]
    pub id: Option<String>,
    pub state_vector: Vec<f32>,
    pub action: String,
    pub reward: f64,
    pub next_state_vector: Vec<f32>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A record returned from a similarity query together with its distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredExperience {
    pub record: ExperienceRecord,
    /// Distance to the query under the store's metric (lower is closer).
    pub distance: f32,
}
