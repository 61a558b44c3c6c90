//! Store configuration types for AgentDB.
//!
//! `StoreConfig` is loaded from `agentdb.toml` or built in code. Every field
//! has a default; `validate()` runs when a store is constructed so bad values
//! fail before first use.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Configuration for a single AgentDB instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Logical database name, reported in stats and used for snapshot file names.
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Dimension of every state and next-state vector.
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    /// Memory bound in MiB. `None` or `0` means unbounded.
    #[serde(default)]
    pub max_memory_mb: Option<u64>,

    /// Distance metric used by the similarity index.
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Exact brute-force scan or approximate HNSW graph.
    #[serde(default)]
    pub index: IndexKind,

    /// Parameters used when `index = "hnsw"`.
    #[serde(default)]
    pub hnsw: HnswParams,

    /// Also build a similarity index over `next_state_vector`.
    #[serde(default)]
    pub index_next_state: bool,

    /// Upper bound on rows scanned by one exact search. `None` scans everything.
    #[serde(default)]
    pub search_row_budget: Option<usize>,

    /// What to do when an insert would exceed the memory bound.
    #[serde(default)]
    pub eviction: EvictionPolicy,
}

fn default_db_name() -> String {
    "agentdb".to_string()
}

fn default_vector_dim() -> usize {
    128
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
            vector_dim: default_vector_dim(),
            max_memory_mb: None,
            metric: DistanceMetric::default(),
            index: IndexKind::default(),
            hnsw: HnswParams::default(),
            index_next_state: false,
            search_row_budget: None,
            eviction: EvictionPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Shorthand for a config with the given name and dimension, defaults elsewhere.
    pub fn new(db_name: impl Into<String>, vector_dim: usize) -> Self {
        Self {
            db_name: db_name.into(),
            vector_dim,
            ..Self::default()
        }
    }

    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_name.trim().is_empty() {
            return Err(ConfigError::EmptyDbName);
        }
        if self.vector_dim == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if self.search_row_budget == Some(0) {
            return Err(ConfigError::InvalidSearchBudget);
        }
        if self.index == IndexKind::Hnsw {
            self.hnsw.validate()?;
        }
        Ok(())
    }

    /// Memory bound in bytes, or `None` when unbounded.
    pub fn memory_limit_bytes(&self) -> Option<usize> {
        match self.max_memory_mb {
            None | Some(0) => None,
            Some(mb) => Some((mb as usize).saturating_mul(1024 * 1024)),
        }
    }
}

/// Distance metric for similarity search. Lower distance means more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    Cosine,
    /// Straight-line L2 distance.
    Euclidean,
    /// Negated inner product.
    DotProduct,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::Cosine
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::DotProduct => write!(f, "dot_product"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot_product" | "dot" => Ok(DistanceMetric::DotProduct),
            other => Err(format!("invalid distance metric: '{other}'")),
        }
    }
}

/// Which similarity index backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Brute-force scan; exact top-k.
    Exact,
    /// Hierarchical navigable small-world graph; approximate, opt-in.
    Hnsw,
}

impl Default for IndexKind {
    fn default() -> Self {
        IndexKind::Exact
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Exact => write!(f, "exact"),
            IndexKind::Hnsw => write!(f, "hnsw"),
        }
    }
}

impl FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" | "flat" => Ok(IndexKind::Exact),
            "hnsw" => Ok(IndexKind::Hnsw),
            other => Err(format!("invalid index kind: '{other}'")),
        }
    }
}

/// HNSW graph parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Max neighbors per node on layers above 0.
    #[serde(default = "default_m")]
    pub m: usize,
    /// Max neighbors per node on layer 0.
    #[serde(default = "default_m0")]
    pub m0: usize,
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
    /// Seed for level assignment, so graphs are reproducible.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_m() -> usize {
    16
}

fn default_m0() -> usize {
    32
}

fn default_ef_construction() -> usize {
    200
}

fn default_ef_search() -> usize {
    64
}

fn default_seed() -> u64 {
    0x5eed
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: default_m(),
            m0: default_m0(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            seed: default_seed(),
        }
    }
}

impl HnswParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.m < 2 {
            return Err(ConfigError::InvalidIndexParams(format!(
                "m must be at least 2, got {}",
                self.m
            )));
        }
        if self.m0 < self.m {
            return Err(ConfigError::InvalidIndexParams(format!(
                "m0 ({}) must be >= m ({})",
                self.m0, self.m
            )));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(ConfigError::InvalidIndexParams(
                "ef_construction and ef_search must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Behavior when an insert would exceed the memory bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Fail the insert with `CapacityExceeded`.
    Reject,
    /// Delete the oldest records until the new one fits.
    OldestFirst,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Reject
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Reject => write!(f, "reject"),
            EvictionPolicy::OldestFirst => write!(f, "oldest_first"),
        }
    }
}
