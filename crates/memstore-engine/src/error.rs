//! Error types for engine communication.

use thiserror::Error;

/// Errors raised by search engine implementations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection or client construction failed
    #[error("Engine configuration error: {0}")]
    Config(String),

    /// Transport-level failure (connect, timeout, TLS)
    #[error("Engine transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status after retries were exhausted
    #[error("Engine returned status {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Document or index does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body could not be decoded
    #[error("Engine response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request body was not one the engine understands
    #[error("Invalid engine request: {0}")]
    InvalidRequest(String),
}
