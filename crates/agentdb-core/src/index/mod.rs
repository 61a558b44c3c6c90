//! Similarity indexes over fixed-dimension vectors.
//!
//! `VectorIndex` is the seam between the experience store and its vector
//! columns. Two implementations exist: `FlatIndex` (exact brute-force scan,
//! the default) and `HnswIndex` (approximate graph search, opt-in).
//!
//! Both rank by ascending distance and break ties by insertion order, so
//! the earlier-inserted vector wins.

pub mod distance;
pub mod flat;
pub mod hnsw;

use std::cmp::Ordering;

use agentdb_types::config::{IndexKind, StoreConfig};
use agentdb_types::error::StoreError;

use self::distance::strategy_for;
use self::flat::FlatIndex;
use self::hnsw::HnswIndex;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub distance: f32,
}

/// A vector index keyed by record ID.
///
/// Mutations take `&mut self`; callers provide exclusive access.
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored and query vector must have.
    fn dimension(&self) -> usize;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `vector` under `id`.
    ///
    /// Fails with `DimensionMismatch` on wrong length and `DuplicateId` if
    /// `id` is already indexed. On failure the index is unchanged.
    fn insert(&mut self, id: &str, vector: &[f32]) -> Result<(), StoreError>;

    /// Remove the vector for `id`, failing with `NotFound` if absent.
    fn remove(&mut self, id: &str) -> Result<(), StoreError>;

    /// Up to `k` IDs nearest to `query`, nearest first.
    ///
    /// An empty index yields an empty result, not an error.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError>;

    /// Drop every vector and release the backing memory.
    fn clear(&mut self);
}

/// Fail with `DimensionMismatch` unless `vector` has exactly `expected` entries.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), StoreError> {
    if vector.len() != expected {
        return Err(StoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Build the index selected by `config.index`.
pub fn build_index(config: &StoreConfig) -> Box<dyn VectorIndex> {
    let distance = strategy_for(config.metric);
    match config.index {
        IndexKind::Exact => Box::new(FlatIndex::new(
            config.vector_dim,
            distance,
            config.search_row_budget,
        )),
        IndexKind::Hnsw => Box::new(HnswIndex::new(
            config.vector_dim,
            distance,
            config.hnsw.clone(),
        )),
    }
}

/// Ranking key shared by the indexes: distance, then insertion sequence.
///
/// `Ord` uses `f32::total_cmp`, so NaN distances sort after every real one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub distance: f32,
    pub seq: u64,
}

impl Candidate {
    pub fn new(seq: u64, distance: f32) -> Self {
        Self { distance, seq }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.seq.cmp(&other.seq))
    }
}
