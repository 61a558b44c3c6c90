//! Approximate index: HNSW (Hierarchical Navigable Small World) graph.
//!
//! Implements the algorithm from Malkov & Yashunin (2018) with:
//! - Configurable M (max neighbors per layer) and ef_construction
//! - Layer selection via P = 1/ln(M), level = floor(-ln(random) * P)
//! - Greedy search at upper layers, beam search at layer 0
//! - Seeded level assignment so the same inserts build the same graph
//!
//! Removal unlinks the node from every layer, reconnects its former
//! neighbors to each other and relinks any node left with too few
//! neighbors, so the graph stays navigable under churn.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use agentdb_types::config::HnswParams;
use agentdb_types::error::StoreError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::distance::Distance;
use super::{Candidate, SearchHit, VectorIndex, check_dimension};

/// A single layer of the graph, mapping node sequence numbers to neighbor lists.
type Layer = BTreeMap<u64, Vec<u64>>;

/// Approximate k-NN index over an HNSW graph.
pub struct HnswIndex {
    dimension: usize,
    distance: Arc<dyn Distance>,
    params: HnswParams,
    /// Level normalization factor: 1 / ln(M).
    ml: f64,
    rng: StdRng,
    /// Layers from bottom (0) to top.
    layers: Vec<Layer>,
    entry_point: Option<u64>,
    max_layer: usize,
    vectors: HashMap<u64, Vec<f32>>,
    ids: HashMap<u64, String>,
    seq_by_id: HashMap<String, u64>,
    next_seq: u64,
}

impl HnswIndex {
    pub fn new(dimension: usize, distance: Arc<dyn Distance>, params: HnswParams) -> Self {
        let ml = 1.0 / (params.m.max(2) as f64).ln();
        let rng = StdRng::seed_from_u64(params.seed);
        Self {
            dimension,
            distance,
            params,
            ml,
            rng,
            layers: vec![Layer::new()],
            entry_point: None,
            max_layer: 0,
            vectors: HashMap::new(),
            ids: HashMap::new(),
            seq_by_id: HashMap::new(),
            next_seq: 0,
        }
    }

    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        (-r.ln() * self.ml).floor() as usize
    }

    fn max_neighbors(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m0
        } else {
            self.params.m
        }
    }

    fn dist_to(&self, query: &[f32], node: u64) -> Option<f32> {
        self.vectors
            .get(&node)
            .map(|v| self.distance.distance(query, v))
    }

    /// Greedy search: starting from `ep`, walk to the closest node at `layer`.
    fn greedy_closest(&self, query: &[f32], ep: u64, layer: usize) -> u64 {
        let mut current = ep;
        let mut current_dist = match self.dist_to(query, ep) {
            Some(d) => d,
            None => return ep,
        };

        loop {
            let mut changed = false;
            let neighbors = self.layers[layer]
                .get(&current)
                .map_or(&[][..], |n| n.as_slice());
            for &nid in neighbors {
                if let Some(d) = self.dist_to(query, nid) {
                    if Candidate::new(nid, d) < Candidate::new(current, current_dist) {
                        current = nid;
                        current_dist = d;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        current
    }

    /// Beam search at `layer`. Returns up to `ef` candidates, nearest first.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[u64],
        ef: usize,
        layer: usize,
    ) -> Vec<Candidate> {
        let mut visited = HashSet::new();
        // Both lists stay sorted ascending.
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut results: Vec<Candidate> = Vec::new();

        for &ep in entry_points {
            if visited.insert(ep) {
                if let Some(d) = self.dist_to(query, ep) {
                    candidates.push(Candidate::new(ep, d));
                    results.push(Candidate::new(ep, d));
                }
            }
        }
        candidates.sort();
        results.sort();
        results.truncate(ef);

        let mut candidate_idx = 0;
        while candidate_idx < candidates.len() {
            let current = candidates[candidate_idx];
            candidate_idx += 1;

            if results.len() >= ef && results.last().is_some_and(|worst| current > *worst) {
                break;
            }

            let Some(neighbors) = self.layers[layer].get(&current.seq) else {
                continue;
            };
            for &nid in neighbors {
                if !visited.insert(nid) {
                    continue;
                }
                let Some(d) = self.dist_to(query, nid) else {
                    continue;
                };
                let candidate = Candidate::new(nid, d);
                let improves = results.len() < ef
                    || results.last().is_some_and(|worst| candidate < *worst);
                if !improves {
                    continue;
                }

                let pos = candidates[candidate_idx..]
                    .binary_search(&candidate)
                    .unwrap_or_else(|e| e);
                candidates.insert(candidate_idx + pos, candidate);

                let rpos = results.binary_search(&candidate).unwrap_or_else(|e| e);
                results.insert(rpos, candidate);
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        results
    }

    /// Keep only the closest `max_neighbors` of `node` at `layer`.
    fn prune_neighbors(&mut self, node: u64, layer: usize, max_neighbors: usize) {
        let Some(node_vec) = self.vectors.get(&node) else {
            return;
        };
        let Some(neighbors) = self.layers[layer].get(&node) else {
            return;
        };

        let mut scored: Vec<Candidate> = neighbors
            .iter()
            .filter_map(|&nid| {
                self.vectors
                    .get(&nid)
                    .map(|nv| Candidate::new(nid, self.distance.distance(node_vec, nv)))
            })
            .collect();
        scored.sort();
        scored.truncate(max_neighbors);

        let pruned: Vec<u64> = scored.into_iter().map(|c| c.seq).collect();
        self.layers[layer].insert(node, pruned);
    }

    fn link(&mut self, node: u64, query: &[f32], level: usize) {
        let Some(ep) = self.entry_point else {
            self.entry_point = Some(node);
            self.max_layer = level;
            return;
        };

        // Phase 1: greedy descent through layers above the new node's level.
        let mut current_ep = ep;
        let top = self.max_layer;
        if top > level {
            for l in (level + 1..=top).rev() {
                current_ep = self.greedy_closest(query, current_ep, l);
            }
        }

        // Phase 2: beam search and connect on each shared layer.
        let mut entry_points = vec![current_ep];
        for l in (0..=level.min(top)).rev() {
            let max_neighbors = self.max_neighbors(l);
            let candidates =
                self.search_layer(query, &entry_points, self.params.ef_construction, l);

            let selected: Vec<u64> = candidates
                .iter()
                .filter(|c| c.seq != node)
                .take(max_neighbors)
                .map(|c| c.seq)
                .collect();
            self.layers[l].insert(node, selected.clone());

            for &nid in &selected {
                let nlist = self.layers[l].entry(nid).or_default();
                if !nlist.contains(&node) {
                    nlist.push(node);
                }
                if nlist.len() > max_neighbors {
                    self.prune_neighbors(nid, l, max_neighbors);
                }
            }

            if !selected.is_empty() {
                entry_points = selected;
            }
        }

        if level > self.max_layer {
            self.entry_point = Some(node);
            self.max_layer = level;
        }
    }

    /// Unlink `node` from every layer and reconnect its former neighbors.
    fn unlink(&mut self, node: u64) {
        // (layer, node) pairs that lost a neighbor.
        let mut touched = BTreeSet::new();

        for l in 0..self.layers.len() {
            let Some(former) = self.layers[l].remove(&node) else {
                continue;
            };
            for (&n, list) in self.layers[l].iter_mut() {
                let before = list.len();
                list.retain(|&x| x != node);
                if list.len() < before {
                    touched.insert((l, n));
                }
            }

            let max_neighbors = self.max_neighbors(l);
            for &n in &former {
                touched.insert((l, n));
                let Some(list) = self.layers[l].get_mut(&n) else {
                    continue;
                };
                for &other in &former {
                    if other != n && !list.contains(&other) {
                        list.push(other);
                    }
                }
                if list.len() > max_neighbors {
                    self.prune_neighbors(n, l, max_neighbors);
                }
            }
        }

        if self.entry_point == Some(node) {
            self.entry_point = None;
            self.max_layer = 0;
            for l in (0..self.layers.len()).rev() {
                if let Some((&seq, _)) = self.layers[l].iter().next() {
                    self.entry_point = Some(seq);
                    self.max_layer = l;
                    break;
                }
            }
            tracing::debug!(
                entry_point = ?self.entry_point,
                max_layer = self.max_layer,
                "hnsw entry point promoted"
            );
        }
        self.layers.truncate(self.max_layer + 1);

        for (l, n) in touched {
            if l >= self.layers.len() {
                continue;
            }
            let floor = (self.max_neighbors(l) / 2).max(1);
            let degree = self.layers[l].get(&n).map_or(floor, Vec::len);
            if degree < floor {
                self.relink(n, l);
            }
        }
    }

    /// Search fresh neighbors for `node` at `layer` and link them both ways.
    fn relink(&mut self, node: u64, layer: usize) {
        let Some(ep) = self.entry_point else {
            return;
        };
        let Some(vector) = self.vectors.get(&node).cloned() else {
            return;
        };

        let mut current_ep = ep;
        for l in (layer + 1..=self.max_layer).rev() {
            current_ep = self.greedy_closest(&vector, current_ep, l);
        }
        let found = self.search_layer(&vector, &[current_ep], self.params.ef_construction, layer);

        let max_neighbors = self.max_neighbors(layer);
        let selected: Vec<u64> = found
            .iter()
            .filter(|c| c.seq != node)
            .take(max_neighbors)
            .map(|c| c.seq)
            .collect();

        let list = self.layers[layer].entry(node).or_default();
        for &nid in &selected {
            if !list.contains(&nid) {
                list.push(nid);
            }
        }
        if list.len() > max_neighbors {
            self.prune_neighbors(node, layer, max_neighbors);
        }

        for &nid in &selected {
            let nlist = self.layers[layer].entry(nid).or_default();
            if !nlist.contains(&node) {
                nlist.push(node);
            }
            if nlist.len() > max_neighbors {
                self.prune_neighbors(nid, layer, max_neighbors);
            }
        }
    }

    /// Pull in every layer-0 node reachable from `results` whose distance is
    /// no worse than the k-th best, then re-sort.
    ///
    /// Beam search stops once its candidate list is full, which can strand
    /// earlier-inserted nodes that tie with the cutoff.
    fn widen_to_cutoff(&self, query: &[f32], results: &mut Vec<Candidate>, k: usize) {
        let Some(cutoff) = results.get(k.saturating_sub(1)).map(|c| c.distance) else {
            return;
        };
        let within = |d: f32| d.total_cmp(&cutoff).is_le();

        let mut seen: HashSet<u64> = results.iter().map(|c| c.seq).collect();
        let mut frontier: Vec<u64> = results
            .iter()
            .filter(|c| within(c.distance))
            .map(|c| c.seq)
            .collect();
        while let Some(seq) = frontier.pop() {
            let Some(neighbors) = self.layers[0].get(&seq) else {
                continue;
            };
            for &nid in neighbors {
                if !seen.insert(nid) {
                    continue;
                }
                if let Some(d) = self.dist_to(query, nid) {
                    if within(d) {
                        results.push(Candidate::new(nid, d));
                        frontier.push(nid);
                    }
                }
            }
        }
        results.sort();
    }

    /// Top up `results` by scanning every vector the graph walk missed.
    fn fill_by_scan(&self, query: &[f32], results: &mut Vec<Candidate>) {
        let seen: HashSet<u64> = results.iter().map(|c| c.seq).collect();
        results.extend(
            self.vectors
                .iter()
                .filter(|(seq, _)| !seen.contains(seq))
                .map(|(&seq, v)| Candidate::new(seq, self.distance.distance(query, v))),
        );
        results.sort();
    }
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn insert(&mut self, id: &str, vector: &[f32]) -> Result<(), StoreError> {
        check_dimension(self.dimension, vector)?;
        if self.seq_by_id.contains_key(id) {
            return Err(StoreError::DuplicateId(id.to_string()));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let level = self.random_level();

        while self.layers.len() <= level {
            self.layers.push(Layer::new());
        }
        for layer in self.layers.iter_mut().take(level + 1) {
            layer.entry(seq).or_default();
        }

        self.vectors.insert(seq, vector.to_vec());
        self.ids.insert(seq, id.to_string());
        self.seq_by_id.insert(id.to_string(), seq);

        self.link(seq, vector, level);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        let seq = self
            .seq_by_id
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.vectors.remove(&seq);
        self.ids.remove(&seq);
        self.unlink(seq);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        check_dimension(self.dimension, query)?;
        let Some(ep) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = self.params.ef_search.max(k);
        let mut current_ep = ep;
        for l in (1..=self.max_layer).rev() {
            current_ep = self.greedy_closest(query, current_ep, l);
        }

        let mut results = self.search_layer(query, &[current_ep], ef, 0);
        self.widen_to_cutoff(query, &mut results, k);

        let wanted = k.min(self.vectors.len());
        if results.len() < wanted {
            tracing::debug!(
                found = results.len(),
                wanted,
                "hnsw walk came up short, scanning remaining vectors"
            );
            self.fill_by_scan(query, &mut results);
        }
        results.truncate(k);

        Ok(results
            .into_iter()
            .filter_map(|c| {
                self.ids.get(&c.seq).map(|id| SearchHit {
                    id: id.clone(),
                    distance: c.distance,
                })
            })
            .collect())
    }

    fn clear(&mut self) {
        self.layers = vec![Layer::new()];
        self.entry_point = None;
        self.max_layer = 0;
        self.vectors = HashMap::new();
        self.ids = HashMap::new();
        self.seq_by_id = HashMap::new();
        self.next_seq = 0;
        self.rng = StdRng::seed_from_u64(self.params.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::distance::{CosineDistance, EuclideanDistance};
    use crate::index::flat::FlatIndex;

    fn params() -> HnswParams {
        HnswParams {
            m: 8,
            m0: 16,
            ef_construction: 100,
            ef_search: 64,
            seed: 7,
        }
    }

    /// Deterministic pseudo-random vectors from a simple LCG.
    fn lcg_vectors(n: usize, dim: usize, mut seed: u64) -> Vec<Vec<f32>> {
        (0..n)
            .map(|_| {
                (0..dim)
                    .map(|_| {
                        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                        (seed >> 33) as f32 / (1u64 << 31) as f32
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn empty_graph_search_returns_empty() {
        let index = HnswIndex::new(4, Arc::new(EuclideanDistance), params());
        assert!(index.search(&[0.0; 4], 5).unwrap().is_empty());
    }

    #[test]
    fn insert_single_node_becomes_entry_point() {
        let mut index = HnswIndex::new(3, Arc::new(EuclideanDistance), params());
        index.insert("only", &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.search(&[0.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "only");
    }

    #[test]
    fn duplicate_and_dimension_errors() {
        let mut index = HnswIndex::new(2, Arc::new(CosineDistance), params());
        index.insert("a", &[1.0, 0.0]).unwrap();
        assert_eq!(
            index.insert("a", &[0.0, 1.0]),
            Err(StoreError::DuplicateId("a".to_string()))
        );
        assert!(matches!(
            index.insert("b", &[0.0]),
            Err(StoreError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.search(&[0.0, 1.0, 2.0], 1),
            Err(StoreError::DimensionMismatch { .. })
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn identical_vectors_tie_break_by_insertion_order() {
        let mut index = HnswIndex::new(2, Arc::new(CosineDistance), params());
        index.insert("A", &[1.0, 0.0]).unwrap();
        index.insert("B", &[1.0, 0.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn small_index_matches_exact_top_k() {
        let vectors = lcg_vectors(12, 4, 42);
        let mut approx = HnswIndex::new(4, Arc::new(EuclideanDistance), params());
        let mut exact = FlatIndex::new(4, Arc::new(EuclideanDistance), None);
        for (i, v) in vectors.iter().enumerate() {
            let id = format!("v{i}");
            approx.insert(&id, v).unwrap();
            exact.insert(&id, v).unwrap();
        }

        for query in lcg_vectors(5, 4, 99) {
            let a = approx.search(&query, 5).unwrap();
            let e = exact.search(&query, 5).unwrap();
            assert_eq!(a, e);
        }
    }

    #[test]
    fn recall_at_10_over_500_vectors() {
        let n = 500;
        let dim = 16;
        let vectors = lcg_vectors(n, dim, 42);
        let mut approx = HnswIndex::new(
            dim,
            Arc::new(EuclideanDistance),
            HnswParams {
                m: 16,
                m0: 32,
                ef_construction: 200,
                ef_search: 200,
                seed: 123,
            },
        );
        let mut exact = FlatIndex::new(dim, Arc::new(EuclideanDistance), None);
        for (i, v) in vectors.iter().enumerate() {
            let id = format!("v{i}");
            approx.insert(&id, v).unwrap();
            exact.insert(&id, v).unwrap();
        }

        let k = 10;
        let queries = lcg_vectors(20, dim, 999);
        let mut total_recall = 0.0;
        for query in &queries {
            let truth: HashSet<String> = exact
                .search(query, k)
                .unwrap()
                .into_iter()
                .map(|h| h.id)
                .collect();
            let found = approx
                .search(query, k)
                .unwrap()
                .into_iter()
                .filter(|h| truth.contains(&h.id))
                .count();
            total_recall += found as f64 / k as f64;
        }

        let avg_recall = total_recall / queries.len() as f64;
        assert!(avg_recall >= 0.9, "Recall@10 = {avg_recall:.3}, expected >= 0.9");
    }

    #[test]
    fn remove_keeps_graph_searchable() {
        let vectors = lcg_vectors(40, 4, 5);
        let mut index = HnswIndex::new(4, Arc::new(EuclideanDistance), params());
        for (i, v) in vectors.iter().enumerate() {
            index.insert(&format!("v{i}"), v).unwrap();
        }
        for i in (0..40).step_by(2) {
            index.remove(&format!("v{i}")).unwrap();
        }
        assert_eq!(index.len(), 20);

        let hits = index.search(&vectors[7], 20).unwrap();
        assert_eq!(hits.len(), 20);
        assert_eq!(hits[0].id, "v7");
        assert!(hits.iter().all(|h| {
            let n: usize = h.id[1..].parse().unwrap();
            n % 2 == 1
        }));
    }

    #[test]
    fn heavy_churn_still_returns_k_results() {
        let sparse = HnswParams {
            m: 4,
            m0: 8,
            ef_construction: 16,
            ef_search: 8,
            seed: 3,
        };
        let vectors = lcg_vectors(400, 8, 17);
        let mut index = HnswIndex::new(8, Arc::new(EuclideanDistance), sparse);
        for (i, v) in vectors.iter().enumerate() {
            index.insert(&format!("v{i}"), v).unwrap();
        }
        for i in 0..320 {
            index.remove(&format!("v{i}")).unwrap();
        }
        assert_eq!(index.len(), 80);

        for query in lcg_vectors(20, 8, 71) {
            let hits = index.search(&query, 80).unwrap();
            assert_eq!(hits.len(), 80);
            let unique: HashSet<&str> = hits.iter().map(|h| h.id.as_str()).collect();
            assert_eq!(unique.len(), 80);
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
            assert!(hits.iter().all(|h| {
                let n: usize = h.id[1..].parse().unwrap();
                n >= 320
            }));
        }
    }

    #[test]
    fn removed_neighbors_are_replaced() {
        let vectors = lcg_vectors(200, 4, 29);
        let mut index = HnswIndex::new(4, Arc::new(EuclideanDistance), params());
        for (i, v) in vectors.iter().enumerate() {
            index.insert(&format!("v{i}"), v).unwrap();
        }
        for i in (0..200).filter(|i| i % 4 != 0) {
            index.remove(&format!("v{i}")).unwrap();
        }

        // Every survivor keeps at least one live neighbor on layer 0.
        for (seq, neighbors) in &index.layers[0] {
            assert!(!neighbors.is_empty(), "node {seq} lost every neighbor");
            assert!(neighbors.iter().all(|n| index.vectors.contains_key(n)));
        }
    }

    #[test]
    fn many_identical_vectors_resolve_in_insertion_order() {
        let mut approx = HnswIndex::new(4, Arc::new(CosineDistance), HnswParams::default());
        let mut exact = FlatIndex::new(4, Arc::new(CosineDistance), None);
        let noise = lcg_vectors(300, 4, 8);
        for (i, v) in noise.iter().enumerate() {
            let vector = if i % 3 == 0 {
                vec![1.0, 0.0, 0.0, 0.0]
            } else {
                v.clone()
            };
            let id = format!("v{i}");
            approx.insert(&id, &vector).unwrap();
            exact.insert(&id, &vector).unwrap();
        }

        let query = [1.0, 0.0, 0.0, 0.0];
        let top5: Vec<String> = approx
            .search(&query, 5)
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(top5, vec!["v0", "v3", "v6", "v9", "v12"]);
        assert_eq!(
            approx.search(&query, 20).unwrap(),
            exact.search(&query, 20).unwrap()
        );
    }

    #[test]
    fn remove_entry_point_promotes_another_node() {
        let mut index = HnswIndex::new(2, Arc::new(EuclideanDistance), params());
        index.insert("a", &[0.0, 0.0]).unwrap();
        index.insert("b", &[1.0, 0.0]).unwrap();
        index.insert("c", &[2.0, 0.0]).unwrap();
        index.remove("a").unwrap();
        index.remove("b").unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c");
        assert_eq!(
            index.remove("a"),
            Err(StoreError::NotFound("a".to_string()))
        );
    }

    #[test]
    fn clear_resets_graph_reproducibly() {
        let vectors = lcg_vectors(30, 3, 11);
        let mut index = HnswIndex::new(3, Arc::new(EuclideanDistance), params());
        for (i, v) in vectors.iter().enumerate() {
            index.insert(&format!("v{i}"), v).unwrap();
        }
        let before = index.search(&vectors[3], 5).unwrap();
        let layers_before = index.max_layer;

        index.clear();
        assert!(index.is_empty());
        assert!(index.search(&vectors[3], 5).unwrap().is_empty());

        for (i, v) in vectors.iter().enumerate() {
            index.insert(&format!("v{i}"), v).unwrap();
        }
        assert_eq!(index.search(&vectors[3], 5).unwrap(), before);
        assert_eq!(index.max_layer, layers_before);
    }
}
