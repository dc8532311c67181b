//! REST embedding provider.
//!
//! Talks to an OpenAI-compatible `/embeddings` endpoint. Any service
//! exposing that contract works by pointing `api_base_url` at it.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use async_trait::async_trait;
use memstore_types::EmbeddingSettings;

use crate::error::EmbeddingError;
use crate::provider::EmbeddingProvider;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Embedding provider backed by a remote REST endpoint.
pub struct RestEmbedder {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
    dimension: usize,
}

impl RestEmbedder {
    /// Build a provider from settings.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::Config` when no API key is configured.
    pub fn from_settings(
        settings: &EmbeddingSettings,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| EmbeddingError::Config("embeddings api_key is required".to_string()))?;
        let base_url = settings
            .api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Ok(Self {
            client: Client::new(),
            model: settings.model.clone(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for RestEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!(model = %self.model, chars = text.len(), "embedding query text");
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": text,
                "dimensions": self.dimension,
            }))
            .send()
            .await?
            .error_for_status()?;
        let parsed: EmbeddingsResponse = response.json().await?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty data array".to_string()))?;
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let settings = EmbeddingSettings::default();
        assert!(matches!(
            RestEmbedder::from_settings(&settings, 8),
            Err(EmbeddingError::Config(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let settings = EmbeddingSettings {
            api_key: Some("sk-test".to_string()),
            api_base_url: Some("http://localhost:8080/v1/".to_string()),
            ..Default::default()
        };
        let embedder = RestEmbedder::from_settings(&settings, 8).unwrap();
        assert_eq!(embedder.base_url, "http://localhost:8080/v1");
        assert_eq!(embedder.dimension(), 8);
    }
}
