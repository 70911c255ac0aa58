//! Vector index adapters
//!
//! The [`VectorIndex`] trait owns collection lifecycle, upsert and query.
//! [`QdrantIndex`] is the production backend; [`MemoryIndex`] is an
//! in-process backend used by the integration tests.

pub mod memory;
mod payload;

pub use memory::MemoryIndex;
pub use payload::*;

use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Distance metric of a collection, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclid,
}

impl DistanceMetric {
    fn to_qdrant(self) -> Distance {
        match self {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
            DistanceMetric::Euclid => Distance::Euclid,
        }
    }

    fn from_qdrant(distance: Distance) -> Option<Self> {
        match distance {
            Distance::Cosine => Some(DistanceMetric::Cosine),
            Distance::Dot => Some(DistanceMetric::Dot),
            Distance::Euclid => Some(DistanceMetric::Euclid),
            _ => None,
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Dot => write!(f, "dot"),
            DistanceMetric::Euclid => write!(f, "euclid"),
        }
    }
}

/// What to do when `ensure_collection` finds an existing collection whose
/// dimension or metric differ from the requested ones.
///
/// The full-reindex path opts into `Recreate` (destroys prior vectors); the
/// incremental path uses `Fail`. Callers of the same collection must not mix
/// the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreatePolicy {
    /// Destroy and recreate the collection
    Recreate,
    /// Fail with a collection conflict
    Fail,
}

/// Schema and size of an existing collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub points_count: u64,
}

/// One query hit, nearest-first
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Adapter over a vector store: collection lifecycle, idempotent upsert,
/// similarity query.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent create. An existing collection with matching schema is
    /// left alone; a mismatched one is handled per `policy`.
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
        policy: RecreatePolicy,
    ) -> Result<()>;

    /// Schema and point count of a collection, `None` when absent
    async fn describe(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Insert or replace points, keyed by their stable chunk identity
    async fn upsert(&self, name: &str, points: Vec<ChunkPoint>) -> Result<()>;

    /// The `k` nearest entries by the collection's metric, nearest-first.
    /// Fails with [`Error::CollectionNotFound`] when the collection is
    /// absent and [`Error::CollectionConflict`] on a dimension mismatch.
    async fn query(&self, name: &str, vector: Vec<f32>, k: usize) -> Result<Vec<ScoredChunk>>;

    /// Drop a collection; returns false when it did not exist
    async fn delete_collection(&self, name: &str) -> Result<bool>;
}

/// Qdrant-backed vector index
pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    /// Connect to Qdrant
    pub fn connect(url: &str, api_key: Option<String>) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let mut builder = Qdrant::from_url(url).skip_compatibility_check();
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("invalid Qdrant configuration: {e}")))?;

        Ok(Self { client })
    }

    async fn create(&self, name: &str, dimension: usize, metric: DistanceMetric) -> Result<()> {
        info!(
            "Creating collection {} (dimension {}, metric {})",
            name, dimension, metric
        );

        let vectors_config = VectorParamsBuilder::new(dimension as u64, metric.to_qdrant());
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await?;

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
        policy: RecreatePolicy,
    ) -> Result<()> {
        match self.describe(name).await? {
            None => self.create(name, dimension, metric).await,
            Some(info) if info.dimension == dimension && info.metric == metric => {
                debug!("Collection {} already exists with matching schema", name);
                Ok(())
            }
            Some(info) => match policy {
                RecreatePolicy::Recreate => {
                    info!(
                        "Recreating collection {} ({} {} -> {} {})",
                        name, info.dimension, info.metric, dimension, metric
                    );
                    self.delete_collection(name).await?;
                    self.create(name, dimension, metric).await
                }
                RecreatePolicy::Fail => Err(Error::CollectionConflict(format!(
                    "collection {} exists with dimension {} metric {}, requested {} {}",
                    name, info.dimension, info.metric, dimension, metric
                ))),
            },
        }
    }

    async fn describe(&self, name: &str) -> Result<Option<CollectionInfo>> {
        if !self.client.collection_exists(name).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(name).await?;
        let Some(result) = info.result else {
            return Ok(None);
        };

        let points_count = result.points_count.unwrap_or(0);
        let params = result
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        let Some(qdrant_client::qdrant::vectors_config::Config::Params(params)) = params else {
            return Err(Error::CollectionConflict(format!(
                "collection {name} uses an unsupported vector layout"
            )));
        };

        let metric = DistanceMetric::from_qdrant(params.distance()).ok_or_else(|| {
            Error::CollectionConflict(format!(
                "collection {name} uses an unsupported distance metric"
            ))
        })?;

        Ok(Some(CollectionInfo {
            dimension: params.size as usize,
            metric,
            points_count,
        }))
    }

    async fn upsert(&self, name: &str, points: Vec<ChunkPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        debug!("Upserting {} points to collection {}", points.len(), name);

        let point_structs: Vec<_> = points.into_iter().map(|p| p.to_point_struct()).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(name, point_structs).wait(true))
            .await?;

        Ok(())
    }

    async fn query(&self, name: &str, vector: Vec<f32>, k: usize) -> Result<Vec<ScoredChunk>> {
        let Some(info) = self.describe(name).await? else {
            return Err(Error::CollectionNotFound(name.to_string()));
        };

        if vector.len() != info.dimension {
            return Err(Error::CollectionConflict(format!(
                "query vector dimension {} does not match collection {} dimension {}",
                vector.len(),
                name,
                info.dimension
            )));
        }

        debug!("Searching collection {} with k {}", name, k);

        let response = self
            .client
            .search_points(SearchPointsBuilder::new(name, vector, k as u64).with_payload(true))
            .await?;

        let results = response
            .result
            .into_iter()
            .map(|p| {
                let payload: ChunkPayload = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect::<serde_json::Map<String, Value>>()
                    .into();

                ScoredChunk {
                    score: p.score,
                    payload,
                }
            })
            .collect();

        Ok(results)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        if !self.client.collection_exists(name).await? {
            return Ok(false);
        }

        info!("Deleting collection {}", name);
        self.client.delete_collection(name).await?;
        Ok(true)
    }
}

/// Convert Qdrant value to serde_json Value
fn json_from_qdrant_value(v: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(json_from_qdrant_value).collect())
        }
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
