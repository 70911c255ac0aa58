//! In-process vector index
//!
//! Implements [`VectorIndex`] over plain maps with brute-force scoring.
//! Used by the integration tests and small embedded deployments; semantics
//! mirror the Qdrant backend, including conflict policies and stable point
//! identity.

use super::{
    ChunkPoint, ChunkPayload, CollectionInfo, DistanceMetric, RecreatePolicy, ScoredChunk,
    VectorIndex,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

struct Collection {
    dimension: usize,
    metric: DistanceMetric,
    points: HashMap<Uuid, (Vec<f32>, ChunkPayload)>,
}

/// Brute-force in-memory vector index
#[derive(Default)]
pub struct MemoryIndex {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Collection>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Total points across all collections (test helper)
    pub fn total_points(&self) -> usize {
        self.lock().values().map(|c| c.points.len()).sum()
    }
}

fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        DistanceMetric::Dot => dot,
        DistanceMetric::Cosine => {
            let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 {
                0.0
            } else {
                dot / (na * nb)
            }
        }
        // Negated distance keeps "larger is nearer" ordering
        DistanceMetric::Euclid => {
            -a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt()
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
        policy: RecreatePolicy,
    ) -> Result<()> {
        let mut collections = self.lock();

        match collections.get(name) {
            None => {}
            Some(c) if c.dimension == dimension && c.metric == metric => return Ok(()),
            Some(c) => match policy {
                RecreatePolicy::Recreate => {
                    collections.remove(name);
                }
                RecreatePolicy::Fail => {
                    return Err(Error::CollectionConflict(format!(
                        "collection {} exists with dimension {} metric {}, requested {} {}",
                        name, c.dimension, c.metric, dimension, metric
                    )));
                }
            },
        }

        collections.insert(
            name.to_string(),
            Collection {
                dimension,
                metric,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn describe(&self, name: &str) -> Result<Option<CollectionInfo>> {
        Ok(self.lock().get(name).map(|c| CollectionInfo {
            dimension: c.dimension,
            metric: c.metric,
            points_count: c.points.len() as u64,
        }))
    }

    async fn upsert(&self, name: &str, points: Vec<ChunkPoint>) -> Result<()> {
        let mut collections = self.lock();
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;

        for point in points {
            if point.vector.len() != collection.dimension {
                return Err(Error::CollectionConflict(format!(
                    "point vector dimension {} does not match collection {} dimension {}",
                    point.vector.len(),
                    name,
                    collection.dimension
                )));
            }
            collection
                .points
                .insert(point.id, (point.vector, point.payload));
        }
        Ok(())
    }

    async fn query(&self, name: &str, vector: Vec<f32>, k: usize) -> Result<Vec<ScoredChunk>> {
        let collections = self.lock();
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;

        if vector.len() != collection.dimension {
            return Err(Error::CollectionConflict(format!(
                "query vector dimension {} does not match collection {} dimension {}",
                vector.len(),
                name,
                collection.dimension
            )));
        }

        let mut hits: Vec<ScoredChunk> = collection
            .points
            .values()
            .map(|(v, payload)| ScoredChunk {
                score: score(collection.metric, &vector, v),
                payload: payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        Ok(self.lock().remove(name).is_some())
    }
}
