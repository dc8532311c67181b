//! Error types for memstore domain types.

use thiserror::Error;

/// Errors raised while constructing or validating domain types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Namespace path failed validation
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Record key failed validation
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}
