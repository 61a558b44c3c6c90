//! Distance strategies for similarity search.
//!
//! Every strategy returns a distance where lower means closer, so indexes
//! can rank with a single ascending ordering regardless of metric.

use std::fmt;
use std::sync::Arc;

use agentdb_types::config::DistanceMetric;

/// A pluggable distance function over equal-length vectors.
///
/// Callers guarantee `a.len() == b.len()`; indexes check dimensions before
/// any distance is computed.
pub trait Distance: fmt::Debug + Send + Sync {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;

    fn metric(&self) -> DistanceMetric;
}

/// Cosine distance: `1 - cosine_similarity`.
///
/// Returns a value in `[0, 2]` where 0 means identical direction.
/// If either vector has zero norm, returns `1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineDistance;

impl Distance for CosineDistance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (x, y) in a.iter().zip(b.iter()) {
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        let denom = (norm_a * norm_b).sqrt();
        if denom < f32::EPSILON {
            return 1.0;
        }
        1.0 - dot / denom
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDistance;

impl Distance for EuclideanDistance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum::<f32>()
            .sqrt()
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Euclidean
    }
}

/// Inner product distance: `-dot(a, b)`.
///
/// Negated so that higher similarity yields a lower distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotProductDistance;

impl Distance for DotProductDistance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        -dot
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::DotProduct
    }
}

/// Resolve the configured metric to its strategy.
pub fn strategy_for(metric: DistanceMetric) -> Arc<dyn Distance> {
    match metric {
        DistanceMetric::Cosine => Arc::new(CosineDistance),
        DistanceMetric::Euclidean => Arc::new(EuclideanDistance),
        DistanceMetric::DotProduct => Arc::new(DotProductDistance),
    }
}
