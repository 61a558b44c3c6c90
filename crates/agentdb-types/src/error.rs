use thiserror::Error;

use crate::state::StoreState;

/// Errors from experience store and vector index operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("experience '{0}' already exists")]
    DuplicateId(String),

    #[error("experience '{0}' not found")]
    NotFound(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("store not ready (state: {0})")]
    NotReady(StoreState),

    #[error("store already closed")]
    AlreadyClosed,

    #[error("capacity exceeded: {required_bytes} bytes required, limit is {limit_bytes} bytes")]
    CapacityExceeded {
        limit_bytes: usize,
        required_bytes: usize,
    },

    #[error("next-state vectors are not indexed in this store")]
    NextStateNotIndexed,
}

/// Errors from configuration validation and loading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("db_name cannot be empty")]
    EmptyDbName,

    #[error("vector_dim must be greater than zero")]
    ZeroDimension,

    #[error("search_row_budget must be greater than zero when set")]
    InvalidSearchBudget,

    #[error("invalid index parameters: {0}")]
    InvalidIndexParams(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config io error: {0}")]
    Io(String),
}

/// Errors from snapshot save/load.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot integrity violation: expected digest '{expected}', got '{actual}'")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
