//! Error types for store operations.

use thiserror::Error;

use memstore_embeddings::EmbeddingError;
use memstore_engine::EngineError;
use memstore_types::TypesError;

/// Unified error type for store operations.
///
/// Only configuration errors and engine failures that survive the bounded
/// retry policy reach callers; everything else (missing documents, expired
/// records, embedding failures, count adjustments, TTL refreshes) degrades
/// gracefully inside the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Configuration error, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine call failed after retries
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Query embedding failed; vector retrieval cannot proceed without it.
    /// (Write-side embedding failures degrade instead of surfacing here.)
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Namespace or key failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Document body could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TypesError> for StoreError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::Config(msg) => StoreError::Config(msg),
            TypesError::InvalidNamespace(msg) | TypesError::InvalidKey(msg) => {
                StoreError::InvalidInput(msg)
            }
        }
    }
}
