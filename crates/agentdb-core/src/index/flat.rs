//! Exact brute-force index.
//!
//! Scans every stored vector in insertion order (O(n * d) per query) and
//! keeps the best `k` in a bounded max-heap. An optional row budget caps the
//! number of vectors scanned per query to bound worst-case latency.

use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;

use agentdb_types::error::StoreError;

use super::distance::Distance;
use super::{Candidate, SearchHit, VectorIndex, check_dimension};

struct FlatEntry {
    id: String,
    vector: Vec<f32>,
}

/// Exact k-NN index backed by an insertion-ordered map.
pub struct FlatIndex {
    dimension: usize,
    distance: Arc<dyn Distance>,
    /// Insertion sequence -> entry. Iteration order is insertion order.
    entries: BTreeMap<u64, FlatEntry>,
    seq_by_id: HashMap<String, u64>,
    next_seq: u64,
    row_budget: Option<usize>,
}

impl FlatIndex {
    /// Create an empty index.
    ///
    /// `row_budget`: maximum vectors scanned per search; `None` scans all.
    pub fn new(dimension: usize, distance: Arc<dyn Distance>, row_budget: Option<usize>) -> Self {
        Self {
            dimension,
            distance,
            entries: BTreeMap::new(),
            seq_by_id: HashMap::new(),
            next_seq: 0,
            row_budget,
        }
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, id: &str, vector: &[f32]) -> Result<(), StoreError> {
        check_dimension(self.dimension, vector)?;
        if self.seq_by_id.contains_key(id) {
            return Err(StoreError::DuplicateId(id.to_string()));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_by_id.insert(id.to_string(), seq);
        self.entries.insert(
            seq,
            FlatEntry {
                id: id.to_string(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        let seq = self
            .seq_by_id
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.entries.remove(&seq);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        check_dimension(self.dimension, query)?;
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.row_budget.unwrap_or(usize::MAX);
        if self.entries.len() > limit {
            tracing::warn!(
                rows = self.entries.len(),
                budget = limit,
                "search row budget reached, scanning oldest rows only"
            );
        }

        // Max-heap of the best k seen so far; the root is the worst kept.
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        for (&seq, entry) in self.entries.iter().take(limit) {
            let candidate = Candidate::new(seq, self.distance.distance(query, &entry.vector));
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .filter_map(|c| {
                self.entries.get(&c.seq).map(|e| SearchHit {
                    id: e.id.clone(),
                    distance: c.distance,
                })
            })
            .collect())
    }

    fn clear(&mut self) {
        self.entries = BTreeMap::new();
        self.seq_by_id = HashMap::new();
        self.next_seq = 0;
    }
}
