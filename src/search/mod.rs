//! Retrieval service
//!
//! Embeds a query string with the same provider configuration used at index
//! time and returns the nearest chunks from a named collection.

use crate::embed::{embed_query, Embedder};
use crate::error::{Error, Result};
use crate::store::VectorIndex;
use serde::Serialize;
use tracing::{debug, info};

/// One retrieval hit, nearest-first
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Path of the source file, relative to its repository root
    pub source_path: String,

    /// The matching text span
    pub content: String,

    /// Similarity score under the collection's metric
    pub score: f32,
}

/// Embed `query_text` and return the top `k` nearest chunks from
/// `collection`. A collection with fewer than `k` entries yields a shorter
/// (possibly empty) result, not an error; an embedder whose dimension does
/// not match the collection is a caller error surfaced as a conflict.
pub async fn search(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    collection: &str,
    query_text: &str,
    k: usize,
) -> Result<Vec<SearchHit>> {
    info!("Searching collection {} for: {}", collection, query_text);

    let Some(info) = index.describe(collection).await? else {
        return Err(Error::CollectionNotFound(collection.to_string()));
    };

    if embedder.dimension() != info.dimension {
        return Err(Error::CollectionConflict(format!(
            "embedder dimension {} does not match collection {} dimension {}",
            embedder.dimension(),
            collection,
            info.dimension
        )));
    }

    let vector = embed_query(embedder, query_text).await?;
    let hits = index.query(collection, vector, k).await?;
    debug!("Got {} hits from {}", hits.len(), collection);

    Ok(hits
        .into_iter()
        .map(|h| SearchHit {
            source_path: h.payload.source_path,
            content: h.payload.content,
            score: h.score,
        })
        .collect())
}

/// Print search hits to the console
pub fn print_search_hits(query: &str, hits: &[SearchHit]) {
    println!("\nQuery: {}\n", query);
    println!("Found {} results:\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [score: {:.3}] {}", i + 1, hit.score, hit.source_path);

        let preview: String = hit.content.chars().take(200).collect();
        let suffix = if hit.content.chars().count() > 200 {
            "..."
        } else {
            ""
        };
        println!("   {}{}\n", preview.trim().replace('\n', " "), suffix);
    }
}
