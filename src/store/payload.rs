//! Payload schema for vector-store points

use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// A point ready to be upserted into a collection
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl ChunkPoint {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Stable point identity: same collection, path and sequence index always
/// map to the same id, so re-upserting an unchanged chunk replaces the old
/// point instead of duplicating it.
pub fn chunk_point_id(collection: &str, source_path: &str, chunk_index: usize) -> Uuid {
    let key = format!("{collection}/{source_path}#{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
}

/// Payload stored with each chunk in the vector index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPayload {
    /// Path of the source file, relative to the repository root
    pub source_path: String,

    /// Chunk sequence index within the file
    pub chunk_index: i64,

    /// The chunk text span
    pub content: String,

    /// Revision token of the file at index time
    pub revision_token: String,

    /// Repository revision at index time
    pub repo_revision: String,

    /// When this chunk was last written
    pub updated_at: String,
}

impl ChunkPayload {
    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("source_path".to_string(), string_to_qdrant(&self.source_path));
        map.insert("chunk_index".to_string(), int_to_qdrant(self.chunk_index));
        map.insert("content".to_string(), string_to_qdrant(&self.content));
        map.insert(
            "revision_token".to_string(),
            string_to_qdrant(&self.revision_token),
        );
        map.insert(
            "repo_revision".to_string(),
            string_to_qdrant(&self.repo_revision),
        );
        map.insert("updated_at".to_string(), string_to_qdrant(&self.updated_at));

        map
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)),
    }
}

impl From<Map<String, Value>> for ChunkPayload {
    fn from(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map)).unwrap_or_else(|_| ChunkPayload {
            source_path: String::new(),
            chunk_index: 0,
            content: String::new(),
            revision_token: String::new(),
            repo_revision: String::new(),
            updated_at: String::new(),
        })
    }
}
