//! The store: operation dispatch over the engine.
//!
//! Stateless apart from the advisory sweep-status cell: every operation
//! is an independent round trip to the engine, safely callable from any
//! number of concurrent callers. The only contended resource is the
//! namespace aggregate, which is mutated exclusively through the
//! accountant's atomic scripted upsert.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use memstore_embeddings::EmbeddingProvider;
use memstore_engine::SearchEngine;
use memstore_types::{
    Item, ListNamespacesRequest, NamespacePath, Operation, OperationResult, Payload, SearchItem,
    SearchRequest, Settings,
};

use crate::codec::{DocumentCodec, StoredDocument};
use crate::error::StoreError;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::namespaces::{NamespaceAccountant, NamespaceUsage};
use crate::planner::RetrievalPlanner;
use crate::schema::TemplateManager;
use crate::ttl::{TtlManager, TtlStatus};

/// Narrow capability interface the surrounding application depends on.
///
/// Orchestration layers hold a `dyn NamespaceStore`, never the concrete
/// [`Store`], so any storage backend can stand in.
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// Write a record, with an optional TTL in minutes.
    async fn put(
        &self,
        namespace: NamespacePath,
        key: String,
        value: Payload,
        ttl_minutes: Option<f64>,
    ) -> Result<(), StoreError>;

    /// Read a record. `Ok(None)` when missing or expired.
    async fn get(
        &self,
        namespace: NamespacePath,
        key: String,
        refresh_ttl: Option<bool>,
    ) -> Result<Option<Item>, StoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, namespace: NamespacePath, key: String) -> Result<(), StoreError>;

    /// Ranked search within a namespace.
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchItem>, StoreError>;

    /// List namespaces matching the request's conditions.
    async fn list_namespaces(
        &self,
        request: ListNamespacesRequest,
    ) -> Result<Vec<NamespacePath>, StoreError>;

    /// Execute operations concurrently. Results arrive in input order and
    /// one operation's failure never aborts the others.
    async fn batch(&self, operations: Vec<Operation>) -> Vec<Result<OperationResult, StoreError>>;
}

/// Summary of a single record, used by statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub namespace: Vec<String>,
    pub key: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Store-wide statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_items: u64,
    pub namespace_count: u64,
    pub oldest_item: Option<ItemSummary>,
    pub newest_item: Option<ItemSummary>,
    pub top_namespaces: Vec<NamespaceUsage>,
}

/// Engine and TTL health, reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub template_version: u32,
    pub cluster: Value,
    pub cluster_info: Value,
    pub ttl: TtlStatus,
    pub indices: IndexInfo,
}

/// Index names this store operates on.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub data_alias: String,
    pub namespace_index: String,
}

/// Durable namespaced KV + semantic memory store over a search engine.
pub struct Store {
    settings: Arc<Settings>,
    engine: Arc<dyn SearchEngine>,
    codec: DocumentCodec,
    ttl: TtlManager,
    accountant: NamespaceAccountant,
    planner: RetrievalPlanner,
    metrics: Arc<dyn MetricsSink>,
}

impl Store {
    /// Create a store over an engine, optionally with an embeddings
    /// provider for semantic retrieval. Metrics default to a no-op sink;
    /// inject one with [`with_metrics`](Self::with_metrics).
    pub fn new(
        settings: Settings,
        engine: Arc<dyn SearchEngine>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let settings = Arc::new(settings);
        Self {
            codec: DocumentCodec::new(embedder.clone()),
            ttl: TtlManager::new(engine.clone(), settings.clone()),
            accountant: NamespaceAccountant::new(engine.clone(), settings.clone()),
            planner: RetrievalPlanner::new(engine.clone(), embedder, settings.clone()),
            metrics: Arc::new(NoopMetrics),
            settings,
            engine,
        }
    }

    /// Replace the metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Install templates and bootstrap indices. Idempotent; run once at
    /// startup.
    pub async fn setup(&self) -> Result<(), StoreError> {
        TemplateManager::new(self.engine.clone(), self.settings.clone())
            .apply()
            .await
    }

    /// Execute one operation with timing and outcome instrumentation.
    /// Instrumentation is advisory: it never changes the result or
    /// failure behavior of the operation.
    pub async fn execute(&self, operation: Operation) -> Result<OperationResult, StoreError> {
        let kind = operation.kind();
        let start = Instant::now();
        let result = self.dispatch(operation).await;
        let duration = start.elapsed();
        if self.settings.log_operations {
            info!(
                operation = kind,
                duration_ms = duration.as_secs_f64() * 1000.0,
                success = result.is_ok(),
                "operation complete"
            );
        }
        self.metrics.record(
            "operation_duration_seconds",
            duration.as_secs_f64(),
            &[
                ("operation", kind),
                ("success", if result.is_ok() { "true" } else { "false" }),
            ],
        );
        result
    }

    async fn dispatch(&self, operation: Operation) -> Result<OperationResult, StoreError> {
        match operation {
            Operation::Put {
                namespace,
                key,
                value,
                ttl_minutes,
            } => {
                self.handle_put(namespace, key, value, ttl_minutes).await?;
                Ok(OperationResult::Done)
            }
            Operation::Get {
                namespace,
                key,
                refresh_ttl,
            } => Ok(OperationResult::Item(
                self.handle_get(namespace, key, refresh_ttl).await?,
            )),
            Operation::Search(request) => {
                Ok(OperationResult::Search(self.handle_search(request).await?))
            }
            Operation::ListNamespaces(request) => Ok(OperationResult::Namespaces(
                self.accountant.list(&request).await?,
            )),
        }
    }

    async fn handle_put(
        &self,
        namespace: NamespacePath,
        key: String,
        value: Option<Payload>,
        ttl_minutes: Option<f64>,
    ) -> Result<(), StoreError> {
        let index = self.settings.data_index_alias();
        let doc_id = namespace.document_id(&key)?;
        let existed = self
            .engine
            .document_exists(&index, &doc_id)
            .await
            .unwrap_or(false);

        let Some(value) = value else {
            if existed {
                self.engine.delete_document(&index, &doc_id).await?;
                self.accountant.record_delta(&namespace, -1).await;
            }
            return Ok(());
        };

        let ttl_minutes = ttl_minutes.or(self.settings.ttl_minutes_default);
        let document = self.codec.encode(&namespace, &key, value, ttl_minutes).await?;
        self.engine
            .index_document(&index, &doc_id, serde_json::to_value(&document)?)
            .await?;
        self.accountant
            .record_delta(&namespace, if existed { 0 } else { 1 })
            .await;
        Ok(())
    }

    async fn handle_get(
        &self,
        namespace: NamespacePath,
        key: String,
        refresh_ttl: Option<bool>,
    ) -> Result<Option<Item>, StoreError> {
        let index = self.settings.data_index_alias();
        let doc_id = namespace.document_id(&key)?;
        let Some(source) = self.engine.get_document(&index, &doc_id).await? else {
            return Ok(None);
        };
        let document: StoredDocument = serde_json::from_value(source)?;
        if TtlManager::is_expired(&document, Utc::now()) {
            // Lazy eviction; deletion failure must not fail the read.
            if let Err(err) = self.engine.delete_document(&index, &doc_id).await {
                debug!(doc_id, error = %err, "lazy eviction failed");
            }
            self.accountant.record_delta(&namespace, -1).await;
            return Ok(None);
        }
        self.ttl.maybe_refresh(&doc_id, &document, refresh_ttl).await;
        Ok(Some(DocumentCodec::decode(document)?))
    }

    async fn handle_search(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<SearchItem>, StoreError> {
        let index = self.settings.data_index_alias();
        let hits = self.planner.search(&request).await?;
        let now = Utc::now();
        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            let document: StoredDocument = match serde_json::from_value(hit.source) {
                Ok(document) => document,
                Err(err) => {
                    warn!(id = %hit.id, error = %err, "skipping undecodable hit");
                    continue;
                }
            };
            if TtlManager::is_expired(&document, now) {
                if let Err(err) = self.engine.delete_document(&index, &hit.id).await {
                    debug!(id = %hit.id, error = %err, "lazy eviction failed");
                }
                continue;
            }
            self.ttl
                .maybe_refresh(&hit.id, &document, request.refresh_ttl)
                .await;
            items.push(SearchItem::from_item(
                DocumentCodec::decode(document)?,
                hit.score,
            ));
        }
        Ok(items)
    }

    /// Delete every expired record, bounded by `batch_size` per call.
    /// Returns the deleted count.
    pub async fn run_ttl_sweep(&self, batch_size: u64) -> Result<u64, StoreError> {
        self.ttl.sweep(batch_size).await
    }

    /// Totals, age extremes, and busiest namespaces.
    pub async fn get_stats(&self) -> Result<StoreStats, StoreError> {
        let data_index = self.settings.data_index_alias();
        let namespace_index = self.settings.namespace_index_name();
        let total_items = self.engine.count(&data_index, None).await?;
        let namespace_count = self.engine.count(&namespace_index, None).await?;
        let oldest_item = self.edge_item("asc").await?;
        let newest_item = self.edge_item("desc").await?;
        let top_namespaces = self.accountant.top(5).await?;
        Ok(StoreStats {
            total_items,
            namespace_count,
            oldest_item,
            newest_item,
            top_namespaces,
        })
    }

    /// Engine health plus TTL sweep status.
    pub async fn get_health(&self) -> Result<StoreHealth, StoreError> {
        let cluster = self.engine.cluster_health().await?;
        let cluster_info = self.engine.cluster_info().await?;
        Ok(StoreHealth {
            template_version: memstore_types::config::TEMPLATE_VERSION,
            cluster,
            cluster_info,
            ttl: self.ttl.status(),
            indices: IndexInfo {
                data_alias: self.settings.data_index_alias(),
                namespace_index: self.settings.namespace_index_name(),
            },
        })
    }

    /// Snapshot the store's indices (or a subset) into a repository.
    pub async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        indices: Option<Vec<String>>,
        wait: bool,
    ) -> Result<Value, StoreError> {
        let body = indices.map(|list| json!({ "indices": list.join(",") }));
        Ok(self
            .engine
            .create_snapshot(repository, snapshot, body, wait)
            .await?)
    }

    /// Restore a snapshot from a repository.
    pub async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        indices: Option<Vec<String>>,
        wait: bool,
    ) -> Result<Value, StoreError> {
        let body = indices.map(|list| json!({ "indices": list.join(",") }));
        Ok(self
            .engine
            .restore_snapshot(repository, snapshot, body, wait)
            .await?)
    }

    /// Delete a snapshot.
    pub async fn delete_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
    ) -> Result<Value, StoreError> {
        Ok(self.engine.delete_snapshot(repository, snapshot).await?)
    }

    async fn edge_item(&self, order: &str) -> Result<Option<ItemSummary>, StoreError> {
        let body = json!({
            "size": 1,
            "sort": [{"created_at": {"order": order}}],
        });
        let response = self
            .engine
            .search(&self.settings.data_index_alias(), body)
            .await?;
        Ok(response.into_hits().into_iter().next().map(|hit| {
            let source = hit.source;
            ItemSummary {
                namespace: source
                    .get("namespace")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|s| s.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                key: source
                    .get("key")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                created_at: source
                    .get("created_at")
                    .and_then(Value::as_str)
                    .and_then(|raw| raw.parse().ok()),
            }
        }))
    }
}

#[async_trait]
impl NamespaceStore for Store {
    async fn put(
        &self,
        namespace: NamespacePath,
        key: String,
        value: Payload,
        ttl_minutes: Option<f64>,
    ) -> Result<(), StoreError> {
        match self
            .execute(Operation::Put {
                namespace,
                key,
                value: Some(value),
                ttl_minutes,
            })
            .await?
        {
            OperationResult::Done => Ok(()),
            other => Err(StoreError::InvalidInput(format!(
                "unexpected result for put: {other:?}"
            ))),
        }
    }

    async fn get(
        &self,
        namespace: NamespacePath,
        key: String,
        refresh_ttl: Option<bool>,
    ) -> Result<Option<Item>, StoreError> {
        match self
            .execute(Operation::Get {
                namespace,
                key,
                refresh_ttl,
            })
            .await?
        {
            OperationResult::Item(item) => Ok(item),
            other => Err(StoreError::InvalidInput(format!(
                "unexpected result for get: {other:?}"
            ))),
        }
    }

    async fn delete(&self, namespace: NamespacePath, key: String) -> Result<(), StoreError> {
        match self
            .execute(Operation::Put {
                namespace,
                key,
                value: None,
                ttl_minutes: None,
            })
            .await?
        {
            OperationResult::Done => Ok(()),
            other => Err(StoreError::InvalidInput(format!(
                "unexpected result for delete: {other:?}"
            ))),
        }
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchItem>, StoreError> {
        match self.execute(Operation::Search(request)).await? {
            OperationResult::Search(items) => Ok(items),
            other => Err(StoreError::InvalidInput(format!(
                "unexpected result for search: {other:?}"
            ))),
        }
    }

    async fn list_namespaces(
        &self,
        request: ListNamespacesRequest,
    ) -> Result<Vec<NamespacePath>, StoreError> {
        match self.execute(Operation::ListNamespaces(request)).await? {
            OperationResult::Namespaces(namespaces) => Ok(namespaces),
            other => Err(StoreError::InvalidInput(format!(
                "unexpected result for list_namespaces: {other:?}"
            ))),
        }
    }

    async fn batch(&self, operations: Vec<Operation>) -> Vec<Result<OperationResult, StoreError>> {
        join_all(operations.into_iter().map(|op| self.execute(op))).await
    }
}
