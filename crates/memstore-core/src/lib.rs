//! # memstore-core
//!
//! The store logic of memstore: a durable namespaced key-value + semantic
//! memory store layered on an external document/vector search engine.
//!
//! Components:
//! - [`codec`]: maps (namespace, key, value, ttl) tuples to and from the
//!   engine's stored document shape, with deterministic identifiers
//! - [`ttl`]: expiry computation, lazy eviction, refresh-on-read, and the
//!   bounded bulk sweep
//! - [`namespaces`]: per-namespace document counts kept consistent through
//!   idempotent scripted upserts, and namespace listing
//! - [`planner`]: lexical/vector/hybrid retrieval with reciprocal-rank
//!   fusion
//! - [`store`]: the operation dispatcher tying it all together
//! - [`schema`]: index templates and bootstrap for `setup()`
//! - [`metrics`]: injected operation-metrics sink

pub mod codec;
pub mod error;
pub mod metrics;
pub mod namespaces;
pub mod planner;
pub mod schema;
pub mod store;
pub mod ttl;

pub use codec::{DocumentCodec, StoredDocument};
pub use error::StoreError;
pub use metrics::{LogMetrics, MetricsSink, NoopMetrics};
pub use namespaces::{NamespaceAccountant, NamespaceUsage};
pub use planner::RetrievalPlanner;
pub use schema::TemplateManager;
pub use store::{ItemSummary, NamespaceStore, Store, StoreHealth, StoreStats};
pub use ttl::{SweepOutcome, TtlManager, TtlStatus};
