//! Namespace accounting.
//!
//! One aggregate document per namespace that has ever held a record,
//! carrying a document count for listings and statistics. Counts are
//! maintained by an idempotent scripted conditional upsert the engine
//! executes atomically per document, so concurrent adjustments cannot
//! race to a lost update and the count never goes negative. The count is
//! a statistics aid under eventual consistency, not a transactional
//! source of truth; aggregates are never deleted.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use memstore_engine::SearchEngine;
use memstore_types::{ListNamespacesRequest, NamespacePath, Settings};

use crate::error::StoreError;

/// Server-side script applied on every count adjustment. Creates the
/// counter when missing, floors it at zero, and rewrites the descriptive
/// fields so a first-write-wins race cannot leave them stale.
const COUNTER_SCRIPT: &str = "if (ctx._source.doc_count == null) { ctx._source.doc_count = 0; } \
     ctx._source.doc_count = Math.max(0, ctx._source.doc_count + params.delta); \
     ctx._source.updated_at = params.updated_at; \
     ctx._source.namespace = params.namespace; \
     ctx._source.namespace_key = params.namespace_key; \
     ctx._source.depth = params.depth;";

/// A namespace aggregate row, as reported by statistics.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceUsage {
    /// The namespace
    pub namespace: NamespacePath,
    /// Approximate live document count
    pub doc_count: i64,
    /// Last adjustment time
    pub updated_at: Option<DateTime<Utc>>,
}

/// Maintains per-namespace aggregates and listings.
pub struct NamespaceAccountant {
    engine: Arc<dyn SearchEngine>,
    settings: Arc<Settings>,
}

impl NamespaceAccountant {
    /// Create an accountant.
    pub fn new(engine: Arc<dyn SearchEngine>, settings: Arc<Settings>) -> Self {
        Self { engine, settings }
    }

    /// Apply a count delta for a namespace: +1 for a new record, 0 for an
    /// overwrite (still touches `updated_at`), -1 for a removal.
    pub async fn adjust(&self, namespace: &NamespacePath, delta: i64) -> Result<(), StoreError> {
        let namespace_key = namespace.namespace_key();
        let now = Utc::now();
        let body = json!({
            "scripted_upsert": true,
            "script": {
                "source": COUNTER_SCRIPT,
                "lang": "painless",
                "params": {
                    "delta": delta,
                    "namespace": namespace.segments(),
                    "namespace_key": namespace_key,
                    "depth": namespace.depth(),
                    "updated_at": now,
                },
            },
            "upsert": {
                "namespace": namespace.segments(),
                "namespace_key": namespace_key,
                "depth": namespace.depth(),
                "doc_count": delta.max(0),
                "updated_at": now,
            },
        });
        self.engine
            .update_document(&self.settings.namespace_index_name(), &namespace_key, body)
            .await?;
        Ok(())
    }

    /// Best-effort variant of [`adjust`](Self::adjust): count maintenance
    /// must never fail the put/get/delete that triggered it.
    pub async fn record_delta(&self, namespace: &NamespacePath, delta: i64) {
        if let Err(err) = self.adjust(namespace, delta).await {
            warn!(namespace = %namespace, delta, error = %err, "namespace count adjustment failed");
        }
    }

    /// List namespaces. The prefix condition is applied engine-side; the
    /// suffix condition, depth truncation, dedup, ordering, and paging are
    /// applied client-side because suffix matching over a keyword-indexed
    /// path is not an engine primitive.
    pub async fn list(
        &self,
        request: &ListNamespacesRequest,
    ) -> Result<Vec<NamespacePath>, StoreError> {
        let fetch_size = (request.limit + request.offset).clamp(50, 1000);
        let query: Value = match &request.prefix {
            Some(prefix) => json!({
                "bool": {"filter": [{"prefix": {"namespace_key": prefix.namespace_key()}}]}
            }),
            None => json!({"match_all": {}}),
        };
        let body = json!({
            "size": fetch_size,
            "query": query,
            "sort": [{"namespace_key": "asc"}],
        });
        let response = self
            .engine
            .search(&self.settings.namespace_index_name(), body)
            .await?;

        let mut namespaces: BTreeSet<NamespacePath> = BTreeSet::new();
        for hit in response.into_hits() {
            let Some(segments) = hit.source.get("namespace").and_then(Value::as_array) else {
                continue;
            };
            let segments: Vec<String> = segments
                .iter()
                .filter_map(|s| s.as_str().map(str::to_string))
                .collect();
            let Ok(namespace) = NamespacePath::new(segments) else {
                continue;
            };
            if let Some(suffix) = &request.suffix {
                if !namespace.matches_suffix(suffix) {
                    continue;
                }
            }
            let namespace = match request.max_depth {
                Some(max_depth) => namespace.truncated(max_depth),
                None => namespace,
            };
            namespaces.insert(namespace);
        }

        Ok(namespaces
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect())
    }

    /// Namespaces with the highest document counts.
    pub async fn top(&self, limit: usize) -> Result<Vec<NamespaceUsage>, StoreError> {
        let body = json!({
            "size": limit,
            "sort": [{"doc_count": {"order": "desc"}}],
            "query": {"match_all": {}},
        });
        let response = self
            .engine
            .search(&self.settings.namespace_index_name(), body)
            .await?;
        let mut usages = Vec::new();
        for hit in response.into_hits() {
            let segments: Vec<String> = hit
                .source
                .get("namespace")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|s| s.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            let Ok(namespace) = NamespacePath::new(segments) else {
                continue;
            };
            usages.push(NamespaceUsage {
                namespace,
                doc_count: hit
                    .source
                    .get("doc_count")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                updated_at: hit
                    .source
                    .get("updated_at")
                    .and_then(Value::as_str)
                    .and_then(|raw| raw.parse().ok()),
            });
        }
        Ok(usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstore_engine::MockEngine;

    fn accountant(engine: Arc<MockEngine>) -> NamespaceAccountant {
        NamespaceAccountant::new(engine, Arc::new(Settings::default()))
    }

    #[tokio::test]
    async fn test_adjust_creates_then_counts() {
        let engine = Arc::new(MockEngine::new());
        let accountant = accountant(engine.clone());
        let ns = NamespacePath::from_segments(&["a", "b"]).unwrap();

        accountant.adjust(&ns, 1).await.unwrap();
        accountant.adjust(&ns, 1).await.unwrap();
        accountant.adjust(&ns, 0).await.unwrap();
        accountant.adjust(&ns, -1).await.unwrap();

        let stored = engine
            .get_document("memstore-namespace", "a::b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["doc_count"], json!(1));
        assert_eq!(stored["namespace_key"], json!("a::b"));
        assert_eq!(stored["depth"], json!(2));
    }

    #[tokio::test]
    async fn test_count_floor_never_negative() {
        let engine = Arc::new(MockEngine::new());
        let accountant = accountant(engine.clone());
        let ns = NamespacePath::from_segments(&["floor"]).unwrap();

        // Two puts, five deletes, in an adversarial order.
        for delta in [-1, 1, -1, -1, 1, -1, -1] {
            accountant.adjust(&ns, delta).await.unwrap();
        }
        let stored = engine
            .get_document("memstore-namespace", "floor")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["doc_count"], json!(0));
    }

    #[tokio::test]
    async fn test_list_prefix_suffix_and_paging() {
        let engine = Arc::new(MockEngine::new());
        let accountant = accountant(engine.clone());
        for segments in [["a", "b"], ["a", "c"], ["x", "b"]] {
            let ns = NamespacePath::from_segments(&segments).unwrap();
            accountant.adjust(&ns, 1).await.unwrap();
        }

        let prefix = ListNamespacesRequest {
            prefix: Some(NamespacePath::from_segments(&["a"]).unwrap()),
            ..ListNamespacesRequest::new()
        };
        let listed = accountant.list(&prefix).await.unwrap();
        assert_eq!(
            listed,
            vec![
                NamespacePath::from_segments(&["a", "b"]).unwrap(),
                NamespacePath::from_segments(&["a", "c"]).unwrap(),
            ]
        );

        let suffix = ListNamespacesRequest {
            suffix: Some(NamespacePath::from_segments(&["b"]).unwrap()),
            ..ListNamespacesRequest::new()
        };
        let listed = accountant.list(&suffix).await.unwrap();
        assert_eq!(
            listed,
            vec![
                NamespacePath::from_segments(&["a", "b"]).unwrap(),
                NamespacePath::from_segments(&["x", "b"]).unwrap(),
            ]
        );

        let paged = ListNamespacesRequest {
            limit: 1,
            offset: 1,
            ..ListNamespacesRequest::new()
        };
        let listed = accountant.list(&paged).await.unwrap();
        assert_eq!(listed, vec![NamespacePath::from_segments(&["a", "c"]).unwrap()]);
    }

    #[tokio::test]
    async fn test_list_max_depth_dedups() {
        let engine = Arc::new(MockEngine::new());
        let accountant = accountant(engine.clone());
        for segments in [vec!["a", "b", "c"], vec!["a", "b", "d"], vec!["a", "e"]] {
            let ns = NamespacePath::from_segments(&segments).unwrap();
            accountant.adjust(&ns, 1).await.unwrap();
        }
        let request = ListNamespacesRequest {
            max_depth: Some(2),
            ..ListNamespacesRequest::new()
        };
        let listed = accountant.list(&request).await.unwrap();
        assert_eq!(
            listed,
            vec![
                NamespacePath::from_segments(&["a", "b"]).unwrap(),
                NamespacePath::from_segments(&["a", "e"]).unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_top_orders_by_count() {
        let engine = Arc::new(MockEngine::new());
        let accountant = accountant(engine.clone());
        let busy = NamespacePath::from_segments(&["busy"]).unwrap();
        let quiet = NamespacePath::from_segments(&["quiet"]).unwrap();
        for _ in 0..3 {
            accountant.adjust(&busy, 1).await.unwrap();
        }
        accountant.adjust(&quiet, 1).await.unwrap();

        let top = accountant.top(5).await.unwrap();
        assert_eq!(top[0].namespace, busy);
        assert_eq!(top[0].doc_count, 3);
        assert_eq!(top[1].doc_count, 1);
    }
}
