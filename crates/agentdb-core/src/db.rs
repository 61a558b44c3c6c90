//! `AgentDb` -- the entry point external bindings call.
//!
//! Validates configuration at construction, owns the lifecycle state machine
//! (`Uninitialized -> Initializing -> Ready -> Closed`) and guards the
//! experience store with one reader-writer lock, so the table, the agent
//! index, the vector indexes and the counters change together. Readers run
//! concurrently; mutations are exclusive. Nothing here blocks on I/O.

use std::fmt;

use agentdb_types::config::StoreConfig;
use agentdb_types::error::{ConfigError, StoreError};
use agentdb_types::experience::{ExperienceRecord, NewExperience, ScoredExperience};
use agentdb_types::state::StoreState;
use agentdb_types::stats::{AgentSummary, StoreStats};
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::store::ExperienceStore;

struct Inner {
    state: StoreState,
    store: Option<ExperienceStore>,
}

impl Inner {
    /// Fail unless data operations are allowed in the current state.
    fn check_ready(&self) -> Result<(), StoreError> {
        match self.state {
            state if state.is_ready() => Ok(()),
            StoreState::Closed => Err(StoreError::AlreadyClosed),
            state => Err(StoreError::NotReady(state)),
        }
    }
}

/// A single experience-replay database instance.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct AgentDb {
    config: StoreConfig,
    inner: RwLock<Inner>,
}

impl fmt::Debug for AgentDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDb")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AgentDb {
    /// Validate `config` and create an uninitialized instance.
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            inner: RwLock::new(Inner {
                state: StoreState::Uninitialized,
                store: None,
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn state(&self) -> StoreState {
        self.inner.read().state
    }

    /// Bring the store to `Ready`.
    ///
    /// Idempotent once ready. Fails with `AlreadyClosed` after `close()`.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        match inner.state {
            StoreState::Ready => return Ok(()),
            StoreState::Closed => return Err(StoreError::AlreadyClosed),
            StoreState::Uninitialized | StoreState::Initializing => {}
        }

        inner.state = StoreState::Initializing;
        inner.store = Some(ExperienceStore::new(self.config.clone()));
        inner.state = StoreState::Ready;

        tracing::info!(
            db_name = %self.config.db_name,
            vector_dim = self.config.vector_dim,
            index = %self.config.index,
            metric = %self.config.metric,
            "agentdb initialized"
        );
        Ok(())
    }

    /// Release the store and move to `Closed`. Closing twice is a no-op.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        if inner.state == StoreState::Closed {
            return;
        }
        inner.store = None;
        inner.state = StoreState::Closed;
        tracing::info!(db_name = %self.config.db_name, "agentdb closed");
    }

    fn read<T>(
        &self,
        op: impl FnOnce(&ExperienceStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let inner = self.inner.read();
        inner.check_ready()?;
        match inner.store.as_ref() {
            Some(store) => op(store),
            None => Err(StoreError::NotReady(inner.state)),
        }
    }

    fn write<T>(
        &self,
        op: impl FnOnce(&mut ExperienceStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut inner = self.inner.write();
        inner.check_ready()?;
        let state = inner.state;
        match inner.store.as_mut() {
            Some(store) => op(store),
            None => Err(StoreError::NotReady(state)),
        }
    }

    /// Store a new experience for `agent_id`.
    ///
    /// A missing ID becomes a UUIDv7 and a missing timestamp becomes the
    /// current Unix time in milliseconds. Returns the stored record.
    pub fn store_experience(
        &self,
        agent_id: &str,
        experience: NewExperience,
    ) -> Result<ExperienceRecord, StoreError> {
        let record = ExperienceRecord {
            id: experience.id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            agent_id: agent_id.to_string(),
            state_vector: experience.state_vector,
            action: experience.action,
            reward: experience.reward,
            next_state_vector: experience.next_state_vector,
            done: experience.done,
            metadata: experience.metadata,
            timestamp: experience
                .timestamp
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
        };
        self.insert_record(record.clone())?;
        Ok(record)
    }

    /// Store a fully formed record, keeping its ID and timestamp.
    pub fn insert_record(&self, record: ExperienceRecord) -> Result<(), StoreError> {
        self.write(|store| store.store(record))
    }

    pub fn get_experience(&self, id: &str) -> Result<ExperienceRecord, StoreError> {
        self.read(|store| store.get(id).cloned())
    }

    /// Every experience for `agent_id`, in insertion order.
    pub fn get_agent_experiences(
        &self,
        agent_id: &str,
    ) -> Result<Vec<ExperienceRecord>, StoreError> {
        self.read(|store| Ok(store.get_by_agent(agent_id).into_iter().cloned().collect()))
    }

    /// Up to `k` experiences with the nearest `state_vector`, nearest first.
    pub fn query_similar(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ExperienceRecord>, StoreError> {
        self.query_similar_scored(vector, k)
            .map(|hits| hits.into_iter().map(|h| h.record).collect())
    }

    /// Like `query_similar`, keeping each result's distance.
    pub fn query_similar_scored(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredExperience>, StoreError> {
        self.read(|store| store.query_similar(vector, k))
    }

    /// Nearest experiences by `next_state_vector`; requires `index_next_state`.
    pub fn query_similar_next_state(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredExperience>, StoreError> {
        self.read(|store| store.query_similar_next_state(vector, k))
    }

    pub fn delete_experience(&self, id: &str) -> Result<ExperienceRecord, StoreError> {
        self.write(|store| store.delete(id))
    }

    /// Remove every experience, returning how many were removed. Idempotent.
    pub fn clear(&self) -> Result<usize, StoreError> {
        self.write(|store| {
            let removed = store.len();
            store.clear();
            Ok(removed)
        })
    }

    /// The `n` most recent experiences, oldest first.
    pub fn recent(&self, n: usize) -> Result<Vec<ExperienceRecord>, StoreError> {
        self.read(|store| Ok(store.recent(n).into_iter().cloned().collect()))
    }

    /// Every experience in insertion order.
    pub fn export_experiences(&self) -> Result<Vec<ExperienceRecord>, StoreError> {
        self.read(|store| Ok(store.iter_chronological().cloned().collect()))
    }

    pub fn agent_summary(&self, agent_id: &str) -> Result<Option<AgentSummary>, StoreError> {
        self.read(|store| Ok(store.agent_summary(agent_id)))
    }

    pub fn agent_summaries(&self) -> Result<Vec<AgentSummary>, StoreError> {
        self.read(|store| Ok(store.agent_summaries()))
    }

    /// Aggregate counters.
    ///
    /// Answers in every lifecycle state: before `Ready` and after `Closed`
    /// it reports zero experiences and `initialized: false`.
    pub fn get_stats(&self) -> StoreStats {
        let inner = self.inner.read();
        match inner.store.as_ref() {
            Some(store) if inner.state.is_ready() => store.stats(true),
            _ => StoreStats {
                total_experiences: 0,
                db_name: self.config.db_name.clone(),
                vector_dim: self.config.vector_dim,
                initialized: false,
                agent_count: 0,
                episodes_completed: 0,
                memory_used_bytes: 0,
                memory_limit_bytes: self.config.memory_limit_bytes().map(|b| b as u64),
                index_kind: self.config.index,
                metric: self.config.metric,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    fn ready_db(dim: usize) -> AgentDb {
        let db = AgentDb::new(StoreConfig::new("test-db", dim)).unwrap();
        db.initialize().unwrap();
        db
    }

    fn experience(id: &str, state: Vec<f32>, reward: f64) -> NewExperience {
        NewExperience {
            id: Some(id.to_string()),
            next_state_vector: state.clone(),
            state_vector: state,
            action: "step".to_string(),
            reward,
            done: false,
            metadata: BTreeMap::new(),
            timestamp: Some(42),
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        assert!(matches!(
            AgentDb::new(StoreConfig::new("", 4)),
            Err(ConfigError::EmptyDbName)
        ));
        assert!(matches!(
            AgentDb::new(StoreConfig::new("db", 0)),
            Err(ConfigError::ZeroDimension)
        ));
    }

    #[test]
    fn operations_before_initialize_are_not_ready() {
        let db = AgentDb::new(StoreConfig::new("db", 2)).unwrap();
        assert_eq!(db.state(), StoreState::Uninitialized);
        assert_eq!(
            db.store_experience("a1", experience("e1", vec![1.0, 0.0], 0.0)),
            Err(StoreError::NotReady(StoreState::Uninitialized))
        );
        assert!(matches!(
            db.query_similar(&[1.0, 0.0], 1),
            Err(StoreError::NotReady(_))
        ));
        assert!(matches!(
            db.get_agent_experiences("a1"),
            Err(StoreError::NotReady(_))
        ));
        assert!(matches!(db.clear(), Err(StoreError::NotReady(_))));
    }

    #[test]
    fn stats_before_initialize_report_uninitialized() {
        let db = AgentDb::new(StoreConfig::new("db", 2)).unwrap();
        let stats = db.get_stats();
        assert!(!stats.initialized);
        assert_eq!(stats.total_experiences, 0);
        assert_eq!(stats.db_name, "db");
        assert_eq!(stats.vector_dim, 2);
        assert_eq!(stats.index_kind, db.config().index);
        assert_eq!(stats.metric, db.config().metric);

        db.initialize().unwrap();
        db.close();
        let closed = db.get_stats();
        assert!(!closed.initialized);
        assert_eq!(closed.total_experiences, 0);
        assert_eq!(closed.db_name, "db");
    }

    #[test]
    fn debug_output_names_config_and_state() {
        let db = ready_db(2);
        let rendered = format!("{db:?}");
        assert!(rendered.contains("AgentDb"));
        assert!(rendered.contains("Ready"));
        assert!(rendered.contains("vector_dim: 2"));
    }

    #[test]
    fn initialize_is_idempotent() {
        let db = ready_db(2);
        db.store_experience("a1", experience("e1", vec![1.0, 0.0], 0.0))
            .unwrap();
        db.initialize().unwrap();
        assert_eq!(db.state(), StoreState::Ready);
        assert_eq!(db.get_stats().total_experiences, 1);
    }

    #[test]
    fn close_blocks_further_use() {
        let db = ready_db(2);
        db.close();
        db.close();
        assert_eq!(db.state(), StoreState::Closed);
        assert_eq!(db.initialize(), Err(StoreError::AlreadyClosed));
        assert_eq!(
            db.get_experience("e1"),
            Err(StoreError::AlreadyClosed)
        );
        assert!(!db.get_stats().initialized);
    }

    #[test]
    fn store_experience_generates_id_and_timestamp() {
        let db = ready_db(2);
        let stored = db
            .store_experience(
                "a1",
                NewExperience {
                    state_vector: vec![0.5, 0.5],
                    next_state_vector: vec![0.6, 0.4],
                    action: "right".to_string(),
                    reward: 1.0,
                    ..NewExperience::default()
                },
            )
            .unwrap();
        assert!(Uuid::parse_str(&stored.id).is_ok());
        assert!(stored.timestamp > 0);
        assert_eq!(stored.agent_id, "a1");
        assert_eq!(db.get_experience(&stored.id).unwrap(), stored);
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let db = ready_db(3);
        let mut input = experience("e1", vec![0.1, f32::MIN_POSITIVE, -7.25], -0.125);
        input.next_state_vector = vec![1e-7, 2.5, 3.0];
        input.done = true;
        input.metadata.insert("env".to_string(), "cartpole".to_string());
        input.metadata.insert("run".to_string(), "7".to_string());

        let stored = db.store_experience("agent-7", input.clone()).unwrap();
        let fetched = db.get_experience("e1").unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.state_vector, input.state_vector);
        assert_eq!(fetched.next_state_vector, input.next_state_vector);
        assert_eq!(fetched.metadata, input.metadata);
        assert_eq!(fetched.timestamp, 42);
        assert!(fetched.done);
    }

    #[test]
    fn duplicate_id_leaves_store_unchanged() {
        let db = ready_db(2);
        db.store_experience("a1", experience("dup", vec![1.0, 0.0], 1.0))
            .unwrap();
        let before = db.get_stats();
        assert_eq!(
            db.store_experience("a2", experience("dup", vec![0.0, 1.0], 2.0)),
            Err(StoreError::DuplicateId("dup".to_string()))
        );
        assert_eq!(db.get_stats(), before);
        assert_eq!(db.get_experience("dup").unwrap().agent_id, "a1");
    }

    #[test]
    fn dimension_mismatch_creates_no_partial_state() {
        let db = ready_db(4);
        assert!(matches!(
            db.store_experience("a1", experience("e1", vec![1.0, 0.0], 1.0)),
            Err(StoreError::DimensionMismatch { expected: 4, actual: 2 })
        ));
        assert_eq!(db.get_stats().total_experiences, 0);
        assert!(matches!(
            db.get_experience("e1"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn query_similar_identical_vectors_resolve_in_insertion_order() {
        let db = ready_db(2);
        db.store_experience("a1", experience("A", vec![1.0, 0.0], 0.0))
            .unwrap();
        db.store_experience("a1", experience("B", vec![1.0, 0.0], 0.0))
            .unwrap();
        let ids: Vec<String> = db
            .query_similar(&[1.0, 0.0], 2)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn query_similar_on_empty_store_is_empty() {
        let db = ready_db(2);
        assert!(db.query_similar(&[1.0, 0.0], 5).unwrap().is_empty());
        assert!(matches!(
            db.query_similar(&[1.0], 5),
            Err(StoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn agent_scenario_average_reward() {
        let db = ready_db(2);
        db.store_experience("a1", experience("r1", vec![1.0, 0.0], 0.2))
            .unwrap();
        db.store_experience("b1", experience("other", vec![0.0, 1.0], 9.0))
            .unwrap();
        db.store_experience("a1", experience("r2", vec![0.5, 0.5], 1.5))
            .unwrap();
        db.store_experience("a1", experience("r3", vec![0.0, 1.0], -0.3))
            .unwrap();

        let records = db.get_agent_experiences("a1").unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert!(records.iter().all(|r| r.agent_id == "a1"));

        let avg = records.iter().map(|r| r.reward).sum::<f64>() / records.len() as f64;
        assert!((avg - 0.4667).abs() < 1e-4);
        assert!(db.get_agent_experiences("unknown").unwrap().is_empty());
    }

    #[test]
    fn clear_then_get_is_not_found() {
        let db = ready_db(2);
        db.store_experience("a1", experience("e1", vec![1.0, 0.0], 0.0))
            .unwrap();
        assert_eq!(db.clear().unwrap(), 1);
        assert_eq!(db.clear().unwrap(), 0);
        assert_eq!(db.get_stats().total_experiences, 0);
        assert!(db.get_stats().initialized);
        assert_eq!(
            db.get_experience("e1"),
            Err(StoreError::NotFound("e1".to_string()))
        );
    }

    #[test]
    fn delete_experience_removes_record() {
        let db = ready_db(2);
        db.store_experience("a1", experience("e1", vec![1.0, 0.0], 0.0))
            .unwrap();
        let removed = db.delete_experience("e1").unwrap();
        assert_eq!(removed.id, "e1");
        assert!(db.query_similar(&[1.0, 0.0], 1).unwrap().is_empty());
        assert_eq!(
            db.delete_experience("e1"),
            Err(StoreError::NotFound("e1".to_string()))
        );
    }

    #[test]
    fn export_and_recent_follow_insertion_order() {
        let db = ready_db(2);
        for id in ["x", "y", "z"] {
            db.store_experience("a1", experience(id, vec![1.0, 1.0], 0.0))
                .unwrap();
        }
        let all: Vec<String> = db
            .export_experiences()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(all, vec!["x", "y", "z"]);
        let last: Vec<String> = db.recent(1).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(last, vec!["z"]);
    }

    #[test]
    fn concurrent_readers_and_writers_stay_consistent() {
        let db = Arc::new(ready_db(2));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    for i in 0..50 {
                        db.store_experience(
                            &format!("agent-{w}"),
                            experience(&format!("w{w}-{i}"), vec![w as f32, i as f32], 1.0),
                        )
                        .unwrap();
                    }
                })
            })
            .collect();
        let reader = {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..50 {
                    let stats = db.get_stats();
                    let exported = db.export_experiences().unwrap();
                    assert!(exported.len() as u64 >= stats.total_experiences);
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(db.get_stats().total_experiences, 200);
        assert_eq!(db.get_stats().agent_count, 4);
        for w in 0..4 {
            assert_eq!(
                db.get_agent_experiences(&format!("agent-{w}")).unwrap().len(),
                50
            );
        }
    }
}
