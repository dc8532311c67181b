//! Stored records and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::namespace::NamespacePath;

/// Open string-keyed payload. Values are loosely typed JSON (strings,
/// numbers, booleans, nested maps); insertion order is preserved by the
/// underlying map.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A stored record addressed by (namespace, key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Namespace the record lives in
    pub namespace: NamespacePath,

    /// Key, unique within the namespace
    pub key: String,

    /// The record payload
    pub value: Payload,

    /// Creation timestamp (UTC). Reset on every overwrite because writes
    /// upsert the full document.
    pub created_at: DateTime<Utc>,

    /// Last-write timestamp (UTC)
    pub updated_at: DateTime<Utc>,
}

/// A record returned from search, with its retrieval score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Namespace the record lives in
    pub namespace: NamespacePath,

    /// Key, unique within the namespace
    pub key: String,

    /// The record payload
    pub value: Payload,

    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,

    /// Last-write timestamp (UTC)
    pub updated_at: DateTime<Utc>,

    /// Relevance score. Engine-native for single-mode searches, fused
    /// reciprocal-rank score for hybrid searches. Absent for unranked
    /// (match-all) results.
    pub score: Option<f64>,
}

impl SearchItem {
    /// Attach a score to an item.
    pub fn from_item(item: Item, score: Option<f64>) -> Self {
        Self {
            namespace: item.namespace,
            key: item.key,
            value: item.value,
            created_at: item.created_at,
            updated_at: item.updated_at,
            score,
        }
    }
}
