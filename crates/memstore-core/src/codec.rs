//! Document codec.
//!
//! Maps a (namespace, key, value, ttl) tuple to and from the engine's
//! stored representation. Identifiers are the deterministic `::`-join of
//! namespace segments and key, so writing the same address twice replaces
//! the prior document instead of creating a duplicate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use memstore_embeddings::EmbeddingProvider;
use memstore_types::{Item, NamespacePath, Payload};

use crate::error::StoreError;

/// Payload fields probed for embeddable text, in priority order. The
/// first present string field wins.
pub const TEXT_FIELD_PRIORITY: [&str; 3] = ["text", "body", "content"];

/// The document shape stored in the data index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Namespace segments
    pub namespace: Vec<String>,

    /// Separator-joined namespace, used in term and prefix filters
    pub namespace_key: String,

    /// Namespace depth
    pub depth: usize,

    /// Record key, unique within the namespace
    pub key: String,

    /// The record payload
    pub doc: Payload,

    /// Creation timestamp. Writes upsert the full document, so this is
    /// reset on every overwrite; preserved behavior, not a bug to fix.
    pub created_at: DateTime<Utc>,

    /// Last-write timestamp
    pub updated_at: DateTime<Utc>,

    /// Expiry deadline. Absent means the record never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_expires_at: Option<DateTime<Utc>>,

    /// TTL duration in minutes, retained so a refresh can recompute the
    /// deadline with the same duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_minutes: Option<f64>,

    /// Embedding over the payload's text-bearing field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Compute an expiry deadline from a TTL duration in minutes.
pub fn expiry_deadline(now: DateTime<Utc>, ttl_minutes: f64) -> DateTime<Utc> {
    now + Duration::milliseconds((ttl_minutes * 60_000.0) as i64)
}

/// Encodes and decodes stored documents.
pub struct DocumentCodec {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl DocumentCodec {
    /// Create a codec. Without an embedder, documents are stored without
    /// semantic indexing.
    pub fn new(embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { embedder }
    }

    /// Build the stored document for a write.
    ///
    /// Embedding-provider failures degrade the write to a non-semantic
    /// record: logged, never propagated.
    pub async fn encode(
        &self,
        namespace: &NamespacePath,
        key: &str,
        value: Payload,
        ttl_minutes: Option<f64>,
    ) -> Result<StoredDocument, StoreError> {
        memstore_types::validate_key(key)?;
        let now = Utc::now();
        let embedding = self.embed_value(namespace, key, &value).await;
        Ok(StoredDocument {
            namespace: namespace.segments().to_vec(),
            namespace_key: namespace.namespace_key(),
            depth: namespace.depth(),
            key: key.to_string(),
            doc: value,
            created_at: now,
            updated_at: now,
            ttl_expires_at: ttl_minutes.map(|minutes| expiry_deadline(now, minutes)),
            ttl_minutes,
            embedding,
        })
    }

    /// Recover an item from a stored document.
    pub fn decode(document: StoredDocument) -> Result<Item, StoreError> {
        let namespace = NamespacePath::new(document.namespace)?;
        Ok(Item {
            namespace,
            key: document.key,
            value: document.doc,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }

    /// The first present text-bearing field of a payload.
    pub fn extract_text(value: &Payload) -> Option<&str> {
        TEXT_FIELD_PRIORITY
            .iter()
            .find_map(|field| value.get(*field).and_then(|v| v.as_str()))
    }

    async fn embed_value(
        &self,
        namespace: &NamespacePath,
        key: &str,
        value: &Payload,
    ) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        let Some(text) = Self::extract_text(value) else {
            debug!(namespace = %namespace, key, "no text-bearing field, skipping embedding");
            return None;
        };
        match embedder.embed_query(text).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => {
                debug!(namespace = %namespace, key, "provider returned empty embedding");
                None
            }
            Err(err) => {
                warn!(namespace = %namespace, key, error = %err, "embedding failed, storing without vector");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstore_embeddings::HashEmbedder;
    use serde_json::json;

    fn payload(entries: &[(&str, serde_json::Value)]) -> Payload {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_encode_decode_roundtrip_preserves_fields() {
        let codec = DocumentCodec::new(Some(Arc::new(HashEmbedder::new(16))));
        let ns = NamespacePath::from_segments(&["prefs", "u1"]).unwrap();
        let value = payload(&[("text", json!("favorite color is teal"))]);

        let document = codec
            .encode(&ns, "color", value.clone(), Some(5.0))
            .await
            .unwrap();
        assert!(document.embedding.is_some());
        assert_eq!(document.ttl_minutes, Some(5.0));
        let expires = document.ttl_expires_at.unwrap();
        assert!(expires > document.created_at);

        let raw = serde_json::to_value(&document).unwrap();
        let parsed: StoredDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.ttl_expires_at, document.ttl_expires_at);
        assert_eq!(parsed.created_at, document.created_at);

        let item = DocumentCodec::decode(parsed).unwrap();
        assert_eq!(item.namespace, ns);
        assert_eq!(item.key, "color");
        assert_eq!(item.value, value);
    }

    #[tokio::test]
    async fn test_no_ttl_omits_fields() {
        let codec = DocumentCodec::new(None);
        let ns = NamespacePath::from_segments(&["a"]).unwrap();
        let document = codec
            .encode(&ns, "k", payload(&[("x", json!(1))]), None)
            .await
            .unwrap();
        assert!(document.ttl_expires_at.is_none());
        assert!(document.ttl_minutes.is_none());
        let raw = serde_json::to_value(&document).unwrap();
        assert!(raw.get("ttl_expires_at").is_none());
        assert!(raw.get("ttl_minutes").is_none());
    }

    #[tokio::test]
    async fn test_text_extraction_priority() {
        let value = payload(&[
            ("content", json!("third")),
            ("body", json!("second")),
            ("text", json!("first")),
        ]);
        assert_eq!(DocumentCodec::extract_text(&value), Some("first"));

        let value = payload(&[("body", json!("second")), ("note", json!("other"))]);
        assert_eq!(DocumentCodec::extract_text(&value), Some("second"));

        let value = payload(&[("note", json!("other")), ("text", json!(42))]);
        assert_eq!(DocumentCodec::extract_text(&value), None);
    }

    #[tokio::test]
    async fn test_rejects_reserved_separator_in_key() {
        let codec = DocumentCodec::new(None);
        let ns = NamespacePath::from_segments(&["a"]).unwrap();
        let result = codec.encode(&ns, "bad::key", Payload::new(), None).await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_expiry_deadline_fractional_minutes() {
        let now = Utc::now();
        let deadline = expiry_deadline(now, 0.5);
        assert_eq!((deadline - now).num_seconds(), 30);
    }
}
