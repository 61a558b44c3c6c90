//! Aggregate statistics reported by an AgentDB instance.

use serde::{Deserialize, Serialize};

use crate::config::{DistanceMetric, IndexKind};

/// Store-wide counters. Maintained incrementally, never by a full scan.
///
/// The first four fields form the stable public stats shape; the rest are
/// extra detail for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_experiences: u64,
    pub db_name: String,
    pub vector_dim: usize,
    pub initialized: bool,
    #[serde(default)]
    pub agent_count: u64,
    #[serde(default)]
    pub episodes_completed: u64,
    #[serde(default)]
    pub memory_used_bytes: u64,
    #[serde(default)]
    pub memory_limit_bytes: Option<u64>,
    #[serde(default)]
    pub index_kind: IndexKind,
    #[serde(default)]
    pub metric: DistanceMetric,
}

/// Per-agent aggregate over every stored experience for that agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub experience_count: u64,
    pub total_reward: f64,
    pub mean_reward: f64,
    /// Number of experiences with `done = true`.
    pub episodes_completed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_stats_public_shape() {
        let stats = StoreStats {
            total_experiences: 3,
            db_name: "replay".to_string(),
            vector_dim: 4,
            initialized: true,
            agent_count: 1,
            episodes_completed: 0,
            memory_used_bytes: 512,
            memory_limit_bytes: None,
            index_kind: IndexKind::Exact,
            metric: DistanceMetric::Cosine,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_experiences"], 3);
        assert_eq!(json["db_name"], "replay");
        assert_eq!(json["vector_dim"], 4);
        assert_eq!(json["initialized"], true);
    }

    #[test]
    fn test_store_stats_accepts_minimal_shape() {
        let json = r#"{"total_experiences":0,"db_name":"x","vector_dim":2,"initialized":false}"#;
        let stats: StoreStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.agent_count, 0);
        assert_eq!(stats.index_kind, IndexKind::Exact);
    }
}
