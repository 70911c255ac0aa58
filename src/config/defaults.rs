//! Default values for configuration

/// Default Qdrant URL for local development
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default embedding provider
pub fn default_embedding_provider() -> String {
    if cfg!(feature = "local-embed") {
        "local".to_string()
    } else {
        "openai".to_string()
    }
}

/// Default embedding model (BAAI/bge-small-en-v1.5)
pub fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

/// Default embedding dimension for bge-small-en-v1.5
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default endpoint for the HTTP embedding backend (OpenAI-compatible)
pub fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Default environment variable name for the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default maximum characters per chunk
pub fn default_chunk_size() -> usize {
    512
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    64
}

/// Default number of files embedded/upserted concurrently
pub fn default_sync_concurrency() -> usize {
    4
}

/// Default retry attempts for transient provider failures
pub fn default_sync_max_retries() -> u32 {
    3
}

/// Default base backoff delay in milliseconds
pub fn default_sync_retry_base_ms() -> u64 {
    250
}

/// Default number of query results
pub fn default_query_k() -> usize {
    10
}
