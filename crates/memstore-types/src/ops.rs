//! Typed operations dispatched by the store.
//!
//! A batch is a list of independent operations; each executes on its own
//! and failures stay isolated to that operation's result slot.

use serde::{Deserialize, Serialize};

use crate::item::{Item, Payload, SearchItem};
use crate::namespace::NamespacePath;

/// Parameters for a search operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Namespace the search is scoped to (exact match, no recursion into
    /// child namespaces)
    pub namespace_prefix: NamespacePath,

    /// Optional query string. Absent means match-everything within the
    /// namespace.
    #[serde(default)]
    pub query: Option<String>,

    /// Equality predicates over payload fields (`doc.<key> == value`)
    #[serde(default)]
    pub filter: Option<Payload>,

    /// Maximum results to return
    #[serde(default = "default_search_limit")]
    pub limit: usize,

    /// Results to skip before returning
    #[serde(default)]
    pub offset: usize,

    /// Refresh TTL deadlines of returned records. `None` defers to the
    /// store-level `ttl_refresh_on_read` setting.
    #[serde(default)]
    pub refresh_ttl: Option<bool>,
}

fn default_search_limit() -> usize {
    10
}

impl SearchRequest {
    /// A match-everything search over one namespace with default paging.
    pub fn new(namespace_prefix: NamespacePath) -> Self {
        Self {
            namespace_prefix,
            query: None,
            filter: None,
            limit: default_search_limit(),
            offset: 0,
            refresh_ttl: None,
        }
    }

    /// Set the query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the metadata filter.
    pub fn with_filter(mut self, filter: Payload) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set limit and offset.
    pub fn with_paging(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Parameters for a namespace listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListNamespacesRequest {
    /// Only namespaces under this prefix (applied engine-side)
    #[serde(default)]
    pub prefix: Option<NamespacePath>,

    /// Only namespaces ending with this suffix (applied client-side)
    #[serde(default)]
    pub suffix: Option<NamespacePath>,

    /// Truncate returned paths to this depth
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Maximum paths to return
    #[serde(default = "default_list_limit")]
    pub limit: usize,

    /// Paths to skip, applied after filtering and dedup
    #[serde(default)]
    pub offset: usize,
}

fn default_list_limit() -> usize {
    100
}

impl ListNamespacesRequest {
    /// List everything with default paging.
    pub fn new() -> Self {
        Self {
            limit: default_list_limit(),
            ..Default::default()
        }
    }
}

/// One operation in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Write a record; `value: None` deletes it.
    Put {
        namespace: NamespacePath,
        key: String,
        value: Option<Payload>,
        /// TTL duration in minutes. `None` falls back to the configured
        /// default; records without a TTL never expire.
        ttl_minutes: Option<f64>,
    },

    /// Read a record by key.
    Get {
        namespace: NamespacePath,
        key: String,
        refresh_ttl: Option<bool>,
    },

    /// Ranked search within a namespace.
    Search(SearchRequest),

    /// List namespaces matching prefix/suffix conditions.
    ListNamespaces(ListNamespacesRequest),
}

impl Operation {
    /// Operation kind label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Put { .. } => "put",
            Operation::Get { .. } => "get",
            Operation::Search(_) => "search",
            Operation::ListNamespaces(_) => "list_namespaces",
        }
    }
}

/// Result of one batch operation, matching the operation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum OperationResult {
    /// Put completed
    Done,
    /// Get result; `None` when missing or expired
    Item(Option<Item>),
    /// Ranked search results
    Search(Vec<SearchItem>),
    /// Matching namespaces
    Namespaces(Vec<NamespacePath>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_labels() {
        let ns = NamespacePath::from_segments(&["a"]).unwrap();
        let put = Operation::Put {
            namespace: ns.clone(),
            key: "k".to_string(),
            value: None,
            ttl_minutes: None,
        };
        assert_eq!(put.kind(), "put");
        assert_eq!(Operation::Search(SearchRequest::new(ns)).kind(), "search");
    }

    #[test]
    fn test_search_request_defaults() {
        let ns = NamespacePath::from_segments(&["a"]).unwrap();
        let req = SearchRequest::new(ns);
        assert_eq!(req.limit, 10);
        assert_eq!(req.offset, 0);
        assert!(req.query.is_none());
    }

    #[test]
    fn test_list_request_defaults() {
        let req = ListNamespacesRequest::new();
        assert_eq!(req.limit, 100);
        assert!(req.prefix.is_none());
    }
}
