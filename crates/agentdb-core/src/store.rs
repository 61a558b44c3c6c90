//! The canonical experience table and its secondary indexes.
//!
//! `ExperienceStore` owns:
//! - the primary table (record ID -> record)
//! - a chronological index (insertion sequence -> record ID)
//! - a per-agent index (agent ID -> insertion sequence -> record ID)
//! - the `state_vector` similarity index, plus an optional `next_state_vector` one
//! - incrementally maintained counters (totals, per-agent aggregates, memory)
//!
//! Every mutation validates up front and then updates all of the above, so a
//! failed call leaves no partial state behind. The store itself is not
//! synchronized; `AgentDb` wraps it in a single lock.

use std::collections::{BTreeMap, HashMap};
use std::mem::size_of;

use agentdb_types::config::{EvictionPolicy, StoreConfig};
use agentdb_types::error::StoreError;
use agentdb_types::experience::{ExperienceRecord, ScoredExperience};
use agentdb_types::stats::{AgentSummary, StoreStats};

use crate::index::{SearchHit, VectorIndex, build_index, check_dimension};

struct StoredExperience {
    seq: u64,
    bytes: usize,
    record: ExperienceRecord,
}

#[derive(Debug, Default, Clone)]
struct AgentAggregate {
    count: u64,
    reward_sum: f64,
    episodes: u64,
}

/// In-memory experience table with similarity search.
pub struct ExperienceStore {
    config: StoreConfig,
    records: HashMap<String, StoredExperience>,
    chronological: BTreeMap<u64, String>,
    by_agent: HashMap<String, BTreeMap<u64, String>>,
    agents: HashMap<String, AgentAggregate>,
    state_index: Box<dyn VectorIndex>,
    next_state_index: Option<Box<dyn VectorIndex>>,
    next_seq: u64,
    episodes_completed: u64,
    memory_used: usize,
}

impl ExperienceStore {
    /// Create an empty store. `config` must already be validated.
    pub fn new(config: StoreConfig) -> Self {
        let state_index = build_index(&config);
        let next_state_index = config.index_next_state.then(|| build_index(&config));
        Self {
            config,
            records: HashMap::new(),
            chronological: BTreeMap::new(),
            by_agent: HashMap::new(),
            agents: HashMap::new(),
            state_index,
            next_state_index,
            next_seq: 0,
            episodes_completed: 0,
            memory_used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes currently accounted against the memory bound.
    fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Footprint of a record including its copies in the vector indexes.
    fn footprint(&self, record: &ExperienceRecord) -> usize {
        let indexed_copies = 1 + usize::from(self.next_state_index.is_some());
        record.estimated_bytes()
            + indexed_copies * (record.id.len() + self.config.vector_dim * size_of::<f32>())
    }

    fn validate(&self, record: &ExperienceRecord) -> Result<(), StoreError> {
        if record.id.trim().is_empty() {
            return Err(StoreError::InvalidRecord("id cannot be empty".to_string()));
        }
        if record.agent_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "agent_id cannot be empty".to_string(),
            ));
        }
        let dim = self.state_index.dimension();
        check_dimension(dim, &record.state_vector)?;
        check_dimension(dim, &record.next_state_vector)?;
        if !record.reward.is_finite() {
            return Err(StoreError::InvalidRecord(format!(
                "reward must be finite, got {}",
                record.reward
            )));
        }
        if !all_finite(&record.state_vector) || !all_finite(&record.next_state_vector) {
            return Err(StoreError::InvalidRecord(
                "vectors must contain only finite values".to_string(),
            ));
        }
        if self.records.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id.clone()));
        }
        Ok(())
    }

    /// Enforce the memory bound for an incoming record of `required` bytes.
    ///
    /// Under `OldestFirst`, evicts the oldest records until it fits.
    fn reserve(&mut self, required: usize) -> Result<(), StoreError> {
        let Some(limit) = self.config.memory_limit_bytes() else {
            return Ok(());
        };
        if self.memory_used + required <= limit {
            return Ok(());
        }

        match self.config.eviction {
            EvictionPolicy::Reject => Err(StoreError::CapacityExceeded {
                limit_bytes: limit,
                required_bytes: self.memory_used + required,
            }),
            EvictionPolicy::OldestFirst => {
                if required > limit {
                    return Err(StoreError::CapacityExceeded {
                        limit_bytes: limit,
                        required_bytes: required,
                    });
                }
                let mut evicted = 0usize;
                while self.memory_used + required > limit {
                    let Some(oldest) = self.chronological.values().next().cloned() else {
                        break;
                    };
                    self.delete(&oldest)?;
                    evicted += 1;
                }
                tracing::warn!(
                    evicted,
                    limit_bytes = limit,
                    "memory bound reached, evicted oldest experiences"
                );
                Ok(())
            }
        }
    }

    /// Insert a record into the table and all indexes.
    ///
    /// Fails with `InvalidRecord`, `DimensionMismatch`, `DuplicateId` or
    /// `CapacityExceeded`; on failure nothing is changed (eviction under
    /// `OldestFirst` only happens once the record is known to be valid).
    pub fn store(&mut self, record: ExperienceRecord) -> Result<(), StoreError> {
        self.validate(&record)?;
        let bytes = self.footprint(&record);
        self.reserve(bytes)?;

        self.state_index.insert(&record.id, &record.state_vector)?;
        if let Some(next_index) = self.next_state_index.as_mut() {
            if let Err(e) = next_index.insert(&record.id, &record.next_state_vector) {
                // Roll back so the table and indexes never diverge.
                let _ = self.state_index.remove(&record.id);
                return Err(e);
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let aggregate = self.agents.entry(record.agent_id.clone()).or_default();
        aggregate.count += 1;
        aggregate.reward_sum += record.reward;
        if record.done {
            aggregate.episodes += 1;
            self.episodes_completed += 1;
        }

        self.by_agent
            .entry(record.agent_id.clone())
            .or_default()
            .insert(seq, record.id.clone());
        self.chronological.insert(seq, record.id.clone());
        self.memory_used += bytes;

        tracing::debug!(
            id = %record.id,
            agent_id = %record.agent_id,
            total = self.records.len() + 1,
            "stored experience"
        );
        self.records
            .insert(record.id.clone(), StoredExperience { seq, bytes, record });
        Ok(())
    }

    /// The full record for `id`.
    pub fn get(&self, id: &str) -> Result<&ExperienceRecord, StoreError> {
        self.records
            .get(id)
            .map(|s| &s.record)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// All records for `agent_id` in insertion order. Unknown agents yield an empty list.
    pub fn get_by_agent(&self, agent_id: &str) -> Vec<&ExperienceRecord> {
        self.by_agent
            .get(agent_id)
            .map(|ids| {
                ids.values()
                    .filter_map(|id| self.records.get(id).map(|s| &s.record))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn hydrate(&self, hits: Vec<SearchHit>) -> Result<Vec<ScoredExperience>, StoreError> {
        hits.into_iter()
            .map(|hit| {
                let record = self.get(&hit.id)?.clone();
                Ok(ScoredExperience {
                    record,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    /// Up to `k` records whose `state_vector` is nearest to `vector`, nearest first.
    pub fn query_similar(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredExperience>, StoreError> {
        let hits = self.state_index.search(vector, k)?;
        self.hydrate(hits)
    }

    /// Like `query_similar`, but over `next_state_vector`.
    ///
    /// Fails with `NextStateNotIndexed` unless `index_next_state` is enabled.
    pub fn query_similar_next_state(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredExperience>, StoreError> {
        let index = self
            .next_state_index
            .as_ref()
            .ok_or(StoreError::NextStateNotIndexed)?;
        let hits = index.search(vector, k)?;
        self.hydrate(hits)
    }

    /// Remove one record from the table, the agent index and every vector index.
    pub fn delete(&mut self, id: &str) -> Result<ExperienceRecord, StoreError> {
        let stored = self
            .records
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let StoredExperience { seq, bytes, record } = stored;

        self.state_index.remove(id)?;
        if let Some(next_index) = self.next_state_index.as_mut() {
            next_index.remove(id)?;
        }

        self.chronological.remove(&seq);
        if let Some(ids) = self.by_agent.get_mut(&record.agent_id) {
            ids.remove(&seq);
            if ids.is_empty() {
                self.by_agent.remove(&record.agent_id);
            }
        }

        if let Some(aggregate) = self.agents.get_mut(&record.agent_id) {
            aggregate.count -= 1;
            aggregate.reward_sum -= record.reward;
            if record.done {
                aggregate.episodes -= 1;
            }
            if aggregate.count == 0 {
                self.agents.remove(&record.agent_id);
            }
        }
        if record.done {
            self.episodes_completed -= 1;
        }
        self.memory_used -= bytes;

        tracing::debug!(id = %record.id, agent_id = %record.agent_id, "deleted experience");
        Ok(record)
    }

    /// Remove everything and release index memory. Idempotent.
    pub fn clear(&mut self) {
        let removed = self.records.len();
        self.records = HashMap::new();
        self.chronological = BTreeMap::new();
        self.by_agent = HashMap::new();
        self.agents = HashMap::new();
        self.state_index.clear();
        if let Some(next_index) = self.next_state_index.as_mut() {
            next_index.clear();
        }
        self.next_seq = 0;
        self.episodes_completed = 0;
        self.memory_used = 0;
        tracing::debug!(removed, "cleared experience store");
    }

    /// Records in insertion order, oldest first.
    pub fn iter_chronological(&self) -> impl Iterator<Item = &ExperienceRecord> + '_ {
        self.chronological
            .values()
            .filter_map(|id| self.records.get(id).map(|s| &s.record))
    }

    /// The `n` most recently inserted records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&ExperienceRecord> {
        let mut latest: Vec<&ExperienceRecord> = self
            .chronological
            .values()
            .rev()
            .take(n)
            .filter_map(|id| self.records.get(id).map(|s| &s.record))
            .collect();
        latest.reverse();
        latest
    }

    /// Aggregate for one agent, or `None` if it has no experiences.
    pub fn agent_summary(&self, agent_id: &str) -> Option<AgentSummary> {
        self.agents
            .get(agent_id)
            .map(|agg| summarize(agent_id, agg))
    }

    /// Aggregates for every agent, sorted by agent ID.
    pub fn agent_summaries(&self) -> Vec<AgentSummary> {
        let mut summaries: Vec<AgentSummary> = self
            .agents
            .iter()
            .map(|(agent_id, agg)| summarize(agent_id, agg))
            .collect();
        summaries.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        summaries
    }

    /// Counters in O(1).
    pub fn stats(&self, initialized: bool) -> StoreStats {
        StoreStats {
            total_experiences: self.records.len() as u64,
            db_name: self.config.db_name.clone(),
            vector_dim: self.config.vector_dim,
            initialized,
            agent_count: self.agents.len() as u64,
            episodes_completed: self.episodes_completed,
            memory_used_bytes: self.memory_used() as u64,
            memory_limit_bytes: self.config.memory_limit_bytes().map(|b| b as u64),
            index_kind: self.config.index,
            metric: self.config.metric,
        }
    }
}

fn all_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

fn summarize(agent_id: &str, agg: &AgentAggregate) -> AgentSummary {
    let mean_reward = if agg.count == 0 {
        0.0
    } else {
        agg.reward_sum / agg.count as f64
    };
    AgentSummary {
        agent_id: agent_id.to_string(),
        experience_count: agg.count,
        total_reward: agg.reward_sum,
        mean_reward,
        episodes_completed: agg.episodes,
    }
}
