//! Error types for embedding generation.

use thiserror::Error;

/// Errors that can occur while producing embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider configuration is incomplete
    #[error("Embedding configuration error: {0}")]
    Config(String),

    /// Request to the provider failed
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Provider returned an unusable response
    #[error("Embedding response invalid: {0}")]
    InvalidResponse(String),

    /// Returned vector has the wrong dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
