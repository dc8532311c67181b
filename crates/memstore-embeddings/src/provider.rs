//! Embedding provider trait.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Produces fixed-dimension embedding vectors from text.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector dimension every embedding from this provider has.
    fn dimension(&self) -> usize;

    /// Embed a single query or document text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
