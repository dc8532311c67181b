//! The search engine capability interface.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;
use crate::response::SearchResponse;

/// Minimum engine surface the store depends on.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
/// Index arguments accept aliases wherever the engine does. Request and
/// response bodies are the engine's JSON query DSL; the store owns body
/// construction so this trait stays a thin transport seam.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Fetch a document body by id. `Ok(None)` when the document does not
    /// exist.
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, EngineError>;

    /// Whether a document exists.
    async fn document_exists(&self, index: &str, id: &str) -> Result<bool, EngineError>;

    /// Index (create or fully replace) a document. Last write wins under
    /// concurrency; the engine's own document versioning decides.
    async fn index_document(&self, index: &str, id: &str, document: Value)
        -> Result<(), EngineError>;

    /// Update a document. The body is either a partial update
    /// (`{"doc": {...}}`) or a scripted conditional upsert
    /// (`{"scripted_upsert": true, "script": {...}, "upsert": {...}}`).
    /// Scripted upserts execute atomically per document on the engine.
    async fn update_document(&self, index: &str, id: &str, body: Value)
        -> Result<(), EngineError>;

    /// Delete a document by id. Returns `false` when it was already gone.
    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, EngineError>;

    /// Execute a search. The body may carry `query`, `knn`, `sort`,
    /// `from`, and `size` clauses.
    async fn search(&self, index: &str, body: Value) -> Result<SearchResponse, EngineError>;

    /// Delete every document matching `body["query"]`, bounded by
    /// `body["max_docs"]` when present. Version conflicts from concurrent
    /// deletions are tolerated, not errors. Returns the deleted count.
    async fn delete_by_query(&self, index: &str, body: Value) -> Result<u64, EngineError>;

    /// Count documents, optionally restricted by a query.
    async fn count(&self, index: &str, query: Option<Value>) -> Result<u64, EngineError>;

    /// Cluster health document.
    async fn cluster_health(&self) -> Result<Value, EngineError>;

    /// Cluster/build info document.
    async fn cluster_info(&self) -> Result<Value, EngineError>;

    /// Whether an index (or alias) exists.
    async fn index_exists(&self, index: &str) -> Result<bool, EngineError>;

    /// Create an index with settings/mappings. Creating an index that
    /// already exists is not an error.
    async fn create_index(&self, index: &str, body: Value) -> Result<(), EngineError>;

    /// Point an alias at an index.
    async fn put_alias(&self, index: &str, alias: &str) -> Result<(), EngineError>;

    /// Install (or overwrite) a composable index template.
    async fn put_index_template(&self, name: &str, body: Value) -> Result<(), EngineError>;

    /// Create a snapshot in a named repository.
    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: Option<Value>,
        wait: bool,
    ) -> Result<Value, EngineError>;

    /// Restore a snapshot from a named repository.
    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: Option<Value>,
        wait: bool,
    ) -> Result<Value, EngineError>;

    /// Delete a snapshot.
    async fn delete_snapshot(&self, repository: &str, snapshot: &str)
        -> Result<Value, EngineError>;
}
