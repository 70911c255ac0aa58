//! Embedding generation
//!
//! An abstraction over embedding providers with:
//! - A trait for different backends
//! - An OpenAI-compatible HTTP backend
//! - Local embedding support via fastembed
//! - Batch processing for efficiency

#[cfg(feature = "local-embed")]
mod fastembed_impl;
mod http;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::*;
pub use http::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Embedding width of models this crate knows about
pub fn known_model_dimension(model: &str) -> Option<usize> {
    match model {
        "BAAI/bge-small-en-v1.5" => Some(384),
        "BAAI/bge-base-en-v1.5" => Some(768),
        "BAAI/bge-large-en-v1.5" => Some(1024),
        "sentence-transformers/all-MiniLM-L6-v2" => Some(384),
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

/// Dimension to use for a configured model. A configured dimension that
/// disagrees with a known model's width is corrected here, with a warning,
/// before any collection is created with the wrong size. Unknown models
/// trust the configured value.
pub fn resolved_dimension(config: &EmbeddingConfig) -> usize {
    match known_model_dimension(&config.model) {
        Some(known) if known != config.dimension => {
            warn!(
                "Configured dimension {} does not match model {} (width {}), using {}",
                config.dimension, config.model, known, known
            );
            known
        }
        _ => config.dimension,
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(HttpEmbedder::new(config)?)),
        "local" => {
            #[cfg(feature = "local-embed")]
            {
                Ok(Arc::new(FastEmbedder::new(config)?))
            }
            #[cfg(not(feature = "local-embed"))]
            {
                Err(Error::Config(
                    "embedding.provider = 'local' requires the 'local-embed' feature".to_string(),
                ))
            }
        }
        other => Err(Error::Config(format!(
            "unknown embedding provider '{other}'"
        ))),
    }
}

/// Embed a single query string
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(vec![text.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| Error::ProviderPermanent("no embedding returned".to_string()))
}

/// Helper to embed in batches
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let embeddings = embedder.embed(batch.to_vec()).await?;
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}
