//! Integration tests driving the full store against the in-memory engine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use memstore_core::{NamespaceStore, Store};
use memstore_embeddings::HashEmbedder;
use memstore_engine::{MockEngine, SearchEngine};
use memstore_types::{
    ListNamespacesRequest, NamespacePath, Operation, OperationResult, Payload, SearchMode,
    SearchRequest, Settings,
};

/// TTL small enough to expire within a short sleep (6ms).
const TINY_TTL_MINUTES: f64 = 0.0001;

fn payload(entries: &[(&str, Value)]) -> Payload {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn ns(segments: &[&str]) -> NamespacePath {
    NamespacePath::from_segments(segments).unwrap()
}

async fn store_with(settings: Settings, semantic: bool) -> (Store, Arc<MockEngine>) {
    let engine = Arc::new(MockEngine::new());
    let embedder: Option<Arc<dyn memstore_embeddings::EmbeddingProvider>> = if semantic {
        Some(Arc::new(HashEmbedder::new(64)))
    } else {
        None
    };
    let store = Store::new(settings, engine.clone(), embedder);
    store.setup().await.unwrap();
    (store, engine)
}

async fn plain_store() -> (Store, Arc<MockEngine>) {
    store_with(Settings::default(), false).await
}

async fn aggregate_count(engine: &MockEngine, namespace_key: &str) -> i64 {
    engine
        .get_document("memstore-namespace", namespace_key)
        .await
        .unwrap()
        .and_then(|doc| doc.get("doc_count").and_then(Value::as_i64))
        .unwrap_or(0)
}

#[tokio::test]
async fn test_put_get_roundtrip() {
    let (store, _) = plain_store().await;
    let namespace = ns(&["prefs", "u1"]);
    let value = payload(&[("text", json!("favorite color is teal")), ("rank", json!(3))]);

    store
        .put(namespace.clone(), "color".to_string(), value.clone(), None)
        .await
        .unwrap();
    let item = store
        .get(namespace.clone(), "color".to_string(), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.namespace, namespace);
    assert_eq!(item.key, "color");
    assert_eq!(item.value, value);
    assert!(item.updated_at >= item.created_at);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let (store, _) = plain_store().await;
    let result = store.get(ns(&["empty"]), "k".to_string(), None).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_idempotent_overwrite_counts_once() {
    let (store, engine) = plain_store().await;
    let namespace = ns(&["prefs", "u1"]);

    store
        .put(
            namespace.clone(),
            "color".to_string(),
            payload(&[("text", json!("v1"))]),
            None,
        )
        .await
        .unwrap();
    store
        .put(
            namespace.clone(),
            "color".to_string(),
            payload(&[("text", json!("v2"))]),
            None,
        )
        .await
        .unwrap();

    let item = store
        .get(namespace.clone(), "color".to_string(), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.value, payload(&[("text", json!("v2"))]));

    // Overwrite replaces the document, it does not duplicate it.
    assert_eq!(aggregate_count(&engine, "prefs::u1").await, 1);
    let total = engine.count("memstore-data", None).await.unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_delete_decrements_and_missing_delete_is_noop() {
    let (store, engine) = plain_store().await;
    let namespace = ns(&["inbox"]);

    store
        .put(namespace.clone(), "a".to_string(), payload(&[("x", json!(1))]), None)
        .await
        .unwrap();
    store
        .put(namespace.clone(), "b".to_string(), payload(&[("x", json!(2))]), None)
        .await
        .unwrap();
    assert_eq!(aggregate_count(&engine, "inbox").await, 2);

    store.delete(namespace.clone(), "a".to_string()).await.unwrap();
    assert_eq!(aggregate_count(&engine, "inbox").await, 1);

    // Deleting a missing record neither errors nor moves the count.
    store.delete(namespace.clone(), "a".to_string()).await.unwrap();
    store.delete(namespace.clone(), "ghost".to_string()).await.unwrap();
    assert_eq!(aggregate_count(&engine, "inbox").await, 1);

    store.delete(namespace.clone(), "b".to_string()).await.unwrap();
    assert_eq!(aggregate_count(&engine, "inbox").await, 0);
}

#[tokio::test]
async fn test_ttl_expiry_on_get_and_search() {
    let (store, engine) = plain_store().await;
    let namespace = ns(&["cache"]);

    store
        .put(
            namespace.clone(),
            "short".to_string(),
            payload(&[("text", json!("soon gone"))]),
            Some(TINY_TTL_MINUTES),
        )
        .await
        .unwrap();
    store
        .put(
            namespace.clone(),
            "long".to_string(),
            payload(&[("text", json!("stays"))]),
            None,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    // The search-side liveness filter hides the expired record even
    // before any lazy deletion runs.
    let hits = store
        .search(SearchRequest::new(namespace.clone()))
        .await
        .unwrap();
    let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys, vec!["long"]);

    // Get observes the expiry, evicts, and reports no record.
    let result = store
        .get(namespace.clone(), "short".to_string(), None)
        .await
        .unwrap();
    assert!(result.is_none());
    let raw = engine
        .get_document("memstore-data", "cache::short")
        .await
        .unwrap();
    assert!(raw.is_none(), "lazy eviction should purge the document");
}

#[tokio::test]
async fn test_ttl_sweep_bounded_and_idempotent() {
    let (store, _) = plain_store().await;
    let namespace = ns(&["sweep"]);
    for key in ["a", "b", "c"] {
        store
            .put(
                namespace.clone(),
                key.to_string(),
                payload(&[("x", json!(1))]),
                Some(TINY_TTL_MINUTES),
            )
            .await
            .unwrap();
    }
    store
        .put(
            namespace.clone(),
            "keep".to_string(),
            payload(&[("x", json!(1))]),
            None,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    // Bounded: only batch_size documents go per invocation.
    assert_eq!(store.run_ttl_sweep(2).await.unwrap(), 2);
    assert_eq!(store.run_ttl_sweep(10).await.unwrap(), 1);
    // Idempotent: nothing left to delete.
    assert_eq!(store.run_ttl_sweep(10).await.unwrap(), 0);

    let survivor = store
        .get(namespace.clone(), "keep".to_string(), None)
        .await
        .unwrap();
    assert!(survivor.is_some());
}

#[tokio::test]
async fn test_ttl_refresh_on_read_extends_deadline() {
    let (store, engine) = plain_store().await;
    let namespace = ns(&["session"]);
    store
        .put(
            namespace.clone(),
            "token".to_string(),
            payload(&[("x", json!(1))]),
            Some(1.0),
        )
        .await
        .unwrap();

    let before = engine
        .get_document("memstore-data", "session::token")
        .await
        .unwrap()
        .unwrap()["ttl_expires_at"]
        .as_str()
        .unwrap()
        .to_string();

    tokio::time::sleep(Duration::from_millis(10)).await;

    // A plain read leaves the deadline alone.
    store
        .get(namespace.clone(), "token".to_string(), None)
        .await
        .unwrap()
        .unwrap();
    let unchanged = engine
        .get_document("memstore-data", "session::token")
        .await
        .unwrap()
        .unwrap()["ttl_expires_at"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(before, unchanged);

    // A refreshing read recomputes it from the stored ttl_minutes.
    store
        .get(namespace.clone(), "token".to_string(), Some(true))
        .await
        .unwrap()
        .unwrap();
    let after = engine
        .get_document("memstore-data", "session::token")
        .await
        .unwrap()
        .unwrap()["ttl_expires_at"]
        .as_str()
        .unwrap()
        .to_string();
    let before: chrono::DateTime<chrono::Utc> = before.parse().unwrap();
    let after: chrono::DateTime<chrono::Utc> = after.parse().unwrap();
    assert!(after > before);
}

#[tokio::test]
async fn test_search_metadata_filter() {
    let (store, _) = plain_store().await;
    let namespace = ns(&["notes"]);
    store
        .put(
            namespace.clone(),
            "n1".to_string(),
            payload(&[("text", json!("alpha")), ("tag", json!("blue"))]),
            None,
        )
        .await
        .unwrap();
    store
        .put(
            namespace.clone(),
            "n2".to_string(),
            payload(&[("text", json!("beta")), ("tag", json!("red"))]),
            None,
        )
        .await
        .unwrap();

    let request = SearchRequest::new(namespace.clone())
        .with_filter(payload(&[("tag", json!("blue"))]));
    let hits = store.search(request).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "n1");
}

#[tokio::test]
async fn test_search_scoped_to_exact_namespace() {
    let (store, _) = plain_store().await;
    store
        .put(
            ns(&["a"]),
            "k".to_string(),
            payload(&[("text", json!("first"))]),
            None,
        )
        .await
        .unwrap();
    store
        .put(
            ns(&["a", "b"]),
            "k".to_string(),
            payload(&[("text", json!("child"))]),
            None,
        )
        .await
        .unwrap();

    // Exact namespace match, no recursion into child namespaces.
    let hits = store.search(SearchRequest::new(ns(&["a"]))).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].namespace, ns(&["a"]));
}

#[tokio::test]
async fn test_hybrid_search_ranks_semantic_and_lexical() {
    let settings = Settings {
        search_mode: SearchMode::Auto,
        ..Default::default()
    };
    let (store, _) = store_with(settings, true).await;
    let namespace = ns(&["kb"]);
    store
        .put(
            namespace.clone(),
            "rust".to_string(),
            payload(&[("text", json!("rust systems programming language"))]),
            None,
        )
        .await
        .unwrap();
    store
        .put(
            namespace.clone(),
            "pasta".to_string(),
            payload(&[("text", json!("cooking pasta recipes at home"))]),
            None,
        )
        .await
        .unwrap();

    let request = SearchRequest::new(namespace.clone()).with_query("rust programming");
    let hits = store.search(request).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].key, "rust");
    // Hybrid hits carry the fused reciprocal-rank score.
    let top_score = hits[0].score.unwrap();
    assert!(top_score > 0.0 && top_score <= 2.0);
}

#[tokio::test]
async fn test_vector_mode_without_embedder_falls_back_to_text() {
    let settings = Settings {
        search_mode: SearchMode::Vector,
        ..Default::default()
    };
    let (store, _) = store_with(settings, false).await;
    let namespace = ns(&["kb"]);
    store
        .put(
            namespace.clone(),
            "doc".to_string(),
            payload(&[("text", json!("plain lexical content"))]),
            None,
        )
        .await
        .unwrap();

    let request = SearchRequest::new(namespace.clone()).with_query("lexical content");
    let hits = store.search(request).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "doc");
}

#[tokio::test]
async fn test_search_paging() {
    let (store, _) = plain_store().await;
    let namespace = ns(&["pages"]);
    for key in ["a", "b", "c", "d"] {
        store
            .put(
                namespace.clone(),
                key.to_string(),
                payload(&[("x", json!(1))]),
                None,
            )
            .await
            .unwrap();
    }
    let page_one = store
        .search(SearchRequest::new(namespace.clone()).with_paging(2, 0))
        .await
        .unwrap();
    let page_two = store
        .search(SearchRequest::new(namespace.clone()).with_paging(2, 2))
        .await
        .unwrap();
    assert_eq!(page_one.len(), 2);
    assert_eq!(page_two.len(), 2);
    let mut all: Vec<String> = page_one
        .iter()
        .chain(page_two.iter())
        .map(|h| h.key.clone())
        .collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_list_namespaces_prefix_and_suffix() {
    let (store, _) = plain_store().await;
    for segments in [["a", "b"], ["a", "c"], ["x", "b"]] {
        store
            .put(
                ns(&segments),
                "k".to_string(),
                payload(&[("x", json!(1))]),
                None,
            )
            .await
            .unwrap();
    }

    let prefixed = store
        .list_namespaces(ListNamespacesRequest {
            prefix: Some(ns(&["a"])),
            ..ListNamespacesRequest::new()
        })
        .await
        .unwrap();
    assert_eq!(prefixed, vec![ns(&["a", "b"]), ns(&["a", "c"])]);

    let suffixed = store
        .list_namespaces(ListNamespacesRequest {
            suffix: Some(ns(&["b"])),
            ..ListNamespacesRequest::new()
        })
        .await
        .unwrap();
    assert_eq!(suffixed, vec![ns(&["a", "b"]), ns(&["x", "b"])]);
}

#[tokio::test]
async fn test_batch_isolates_failures_and_keeps_order() {
    let (store, _) = plain_store().await;
    let namespace = ns(&["batch"]);
    let operations = vec![
        Operation::Put {
            namespace: namespace.clone(),
            key: "ok".to_string(),
            value: Some(payload(&[("x", json!(1))])),
            ttl_minutes: None,
        },
        Operation::Put {
            namespace: namespace.clone(),
            key: "bad::key".to_string(),
            value: Some(payload(&[("x", json!(2))])),
            ttl_minutes: None,
        },
        Operation::Get {
            namespace: namespace.clone(),
            key: "ok".to_string(),
            refresh_ttl: None,
        },
    ];

    let results = store.batch(operations).await;
    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], Ok(OperationResult::Done)));
    assert!(results[1].is_err());
    match &results[2] {
        Ok(OperationResult::Item(Some(item))) => assert_eq!(item.key, "ok"),
        other => panic!("unexpected batch slot: {other:?}"),
    }
}

#[tokio::test]
async fn test_stats_and_health() {
    let (store, _) = plain_store().await;
    let busy = ns(&["busy"]);
    for key in ["a", "b", "c"] {
        store
            .put(
                busy.clone(),
                key.to_string(),
                payload(&[("x", json!(1))]),
                None,
            )
            .await
            .unwrap();
    }
    store
        .put(
            ns(&["quiet"]),
            "only".to_string(),
            payload(&[("x", json!(1))]),
            None,
        )
        .await
        .unwrap();

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.total_items, 4);
    assert_eq!(stats.namespace_count, 2);
    assert_eq!(stats.top_namespaces[0].namespace, busy);
    assert_eq!(stats.top_namespaces[0].doc_count, 3);
    assert!(stats.oldest_item.is_some());
    assert!(stats.newest_item.is_some());

    let health = store.get_health().await.unwrap();
    assert_eq!(health.cluster["status"], json!("green"));
    assert!(!health.ttl.enabled);
    assert_eq!(health.indices.data_alias, "memstore-data");
    assert_eq!(health.indices.namespace_index, "memstore-namespace");
    assert!(health.ttl.last_sweep.is_none());

    store.run_ttl_sweep(10).await.unwrap();
    let health = store.get_health().await.unwrap();
    assert!(health.ttl.last_sweep.is_some());
}

#[tokio::test]
async fn test_default_ttl_applies_to_untagged_puts() {
    let settings = Settings {
        ttl_minutes_default: Some(TINY_TTL_MINUTES),
        ..Default::default()
    };
    let (store, _) = store_with(settings, false).await;
    let namespace = ns(&["ephemeral"]);
    store
        .put(
            namespace.clone(),
            "k".to_string(),
            payload(&[("x", json!(1))]),
            None,
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let result = store
        .get(namespace.clone(), "k".to_string(), None)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_snapshot_passthrough() {
    let (store, engine) = plain_store().await;
    let namespace = ns(&["snap"]);
    store
        .put(
            namespace.clone(),
            "k".to_string(),
            payload(&[("x", json!(1))]),
            None,
        )
        .await
        .unwrap();

    store
        .create_snapshot("repo", "s1", None, true)
        .await
        .unwrap();
    engine
        .delete_document("memstore-data", "snap::k")
        .await
        .unwrap();
    store
        .restore_snapshot("repo", "s1", None, true)
        .await
        .unwrap();
    let restored = store
        .get(namespace.clone(), "k".to_string(), None)
        .await
        .unwrap();
    assert!(restored.is_some());
    store.delete_snapshot("repo", "s1").await.unwrap();
}
