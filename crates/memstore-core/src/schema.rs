//! Index templates, mappings, and setup.
//!
//! `setup()` is idempotent: the data index template, the bootstrap index
//! behind the alias, and the namespace index are each created only when
//! missing, so it is safe to run on every startup.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use memstore_engine::SearchEngine;
use memstore_types::Settings;

use crate::error::StoreError;

/// Composable template for data indices: keyword-mapped address fields,
/// date-mapped timestamps, and an HNSW vector field for embeddings.
pub fn data_index_template(settings: &Settings) -> Value {
    json!({
        "index_patterns": [format!("{}-data-*", settings.index_prefix)],
        "template": {
            "settings": {
                "index": {
                    "knn": true,
                    "query": {"default_field": "doc.text"},
                }
            },
            "mappings": {
                "properties": {
                    "namespace": {"type": "keyword"},
                    "namespace_key": {"type": "keyword"},
                    "key": {"type": "keyword"},
                    "depth": {"type": "integer"},
                    "doc": {"type": "object", "enabled": true},
                    "created_at": {"type": "date"},
                    "updated_at": {"type": "date"},
                    "ttl_expires_at": {"type": "date", "null_value": null},
                    "ttl_minutes": {"type": "double"},
                    "embedding": {
                        "type": "knn_vector",
                        "dimension": settings.embedding_dim,
                        "method": {
                            "name": "hnsw",
                            "engine": "lucene",
                            "space_type": "cosinesimil",
                        },
                    },
                }
            },
        },
    })
}

/// Mappings for the namespace aggregate index.
pub fn namespace_index_body() -> Value {
    json!({
        "settings": {
            "index": {
                "refresh_interval": "1s",
            }
        },
        "mappings": {
            "properties": {
                "namespace": {"type": "keyword"},
                "namespace_key": {"type": "keyword"},
                "depth": {"type": "integer"},
                "doc_count": {"type": "long"},
                "updated_at": {"type": "date"},
            }
        },
    })
}

/// Applies templates and bootstraps indices.
pub struct TemplateManager {
    engine: Arc<dyn SearchEngine>,
    settings: Arc<Settings>,
}

impl TemplateManager {
    /// Create a manager.
    pub fn new(engine: Arc<dyn SearchEngine>, settings: Arc<Settings>) -> Self {
        Self { engine, settings }
    }

    /// Install the data template, bootstrap the aliased data index, and
    /// create the namespace index.
    pub async fn apply(&self) -> Result<(), StoreError> {
        self.ensure_data_template().await?;
        self.ensure_namespace_index().await?;
        self.ensure_bootstrap_index().await?;
        info!(prefix = %self.settings.index_prefix, "index setup complete");
        Ok(())
    }

    async fn ensure_data_template(&self) -> Result<(), StoreError> {
        let body = data_index_template(&self.settings);
        self.engine
            .put_index_template(&self.settings.template_name(), body)
            .await?;
        Ok(())
    }

    async fn ensure_bootstrap_index(&self) -> Result<(), StoreError> {
        let index = self.settings.data_index_bootstrap();
        if !self.engine.index_exists(&index).await? {
            let body = data_index_template(&self.settings)["template"].clone();
            self.engine.create_index(&index, body).await?;
        }
        self.engine
            .put_alias(&index, &self.settings.data_index_alias())
            .await?;
        Ok(())
    }

    async fn ensure_namespace_index(&self) -> Result<(), StoreError> {
        let index = self.settings.namespace_index_name();
        if !self.engine.index_exists(&index).await? {
            self.engine
                .create_index(&index, namespace_index_body())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstore_engine::MockEngine;

    #[test]
    fn test_template_carries_embedding_dimension() {
        let settings = Settings {
            embedding_dim: 384,
            ..Default::default()
        };
        let template = data_index_template(&settings);
        assert_eq!(
            template["template"]["mappings"]["properties"]["embedding"]["dimension"],
            json!(384)
        );
        assert_eq!(template["index_patterns"], json!(["memstore-data-*"]));
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let engine = Arc::new(MockEngine::new());
        let settings = Arc::new(Settings::default());
        let manager = TemplateManager::new(engine.clone(), settings.clone());
        manager.apply().await.unwrap();
        manager.apply().await.unwrap();

        assert!(engine.index_exists("memstore-namespace").await.unwrap());
        // The alias resolves to the bootstrap index.
        assert!(engine.index_exists("memstore-data").await.unwrap());
    }
}
