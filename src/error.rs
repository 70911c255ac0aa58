//! Custom error types for repolens

use thiserror::Error;

/// Main error type for repolens operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection conflict: {0}")]
    CollectionConflict(String),

    #[error("Provider error (transient): {0}")]
    ProviderTransient(String),

    #[error("Provider error: {0}")]
    ProviderPermanent(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a retry with backoff may succeed.
    ///
    /// Only network-level provider failures qualify; validation failures
    /// (bad dimension, malformed input) are fatal to the item that raised
    /// them.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ProviderTransient(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for repolens
pub type Result<T> = std::result::Result<T, Error>;

/// Convert qdrant errors
///
/// The vector store is reached over the network, so client errors land in the
/// transient class and are retried; conflicts and missing collections are
/// detected by our own checks before the call is made.
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::ProviderTransient(err.to_string())
    }
}

/// Convert HTTP client errors, classifying timeouts and connection failures
/// as transient.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Error::ProviderTransient(err.to_string())
        } else {
            Error::ProviderPermanent(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::ProviderTransient("timeout".into()).is_transient());
        assert!(!Error::ProviderPermanent("bad input".into()).is_transient());
        assert!(!Error::Validation("overlap >= size".into()).is_transient());
        assert!(!Error::CollectionConflict("dimension 384 != 768".into()).is_transient());
    }
}
