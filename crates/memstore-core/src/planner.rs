//! Retrieval planning.
//!
//! Decides between lexical, vector, and hybrid search, constructs the
//! corresponding engine queries, and merges ranked result sets.
//!
//! Hybrid fusion is by reciprocal rank, not raw score blending: lexical
//! and vector relevance scores live on incomparable scales, so rank
//! position is the only meaningful unit to combine. Each hit at 1-indexed
//! rank `r` in a result list contributes `weight / (r + 1)` to its fused
//! score, and a hit in both lists accumulates both contributions.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use memstore_embeddings::EmbeddingProvider;
use memstore_engine::{Hit, SearchEngine};
use memstore_types::{NamespacePath, Payload, SearchMode, SearchRequest, Settings};

use crate::error::StoreError;
use crate::ttl::TtlManager;

/// Weight applied to each result list under the default fusion policy.
const FUSION_WEIGHT: f64 = 1.0;

/// Plans and executes searches.
pub struct RetrievalPlanner {
    engine: Arc<dyn SearchEngine>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    settings: Arc<Settings>,
}

impl RetrievalPlanner {
    /// Create a planner.
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            engine,
            embedder,
            settings,
        }
    }

    /// The mode this search will run in. An explicit configured mode
    /// wins; `auto` picks hybrid when both a query string and an
    /// embeddings provider are present, lexical otherwise.
    pub fn resolve_mode(&self, query: Option<&str>) -> SearchMode {
        match self.settings.search_mode {
            SearchMode::Auto => {
                if query.is_some_and(|q| !q.is_empty()) && self.embedder.is_some() {
                    SearchMode::Hybrid
                } else {
                    SearchMode::Text
                }
            }
            explicit => explicit,
        }
    }

    /// Execute a search and return ranked raw hits. Expired hits are
    /// already excluded by the liveness filter; callers still run the
    /// lazy-eviction check on each hit before returning items.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Hit>, StoreError> {
        let query = request.query.as_deref();
        let filters = self.build_filters(&request.namespace_prefix, request.filter.as_ref());
        let mode = self.resolve_mode(query);
        debug!(namespace = %request.namespace_prefix, mode = mode.as_str(), "executing search");
        match mode {
            SearchMode::Vector => {
                self.vector_search(query, &filters, request.limit, request.offset)
                    .await
            }
            SearchMode::Hybrid => {
                self.hybrid_search(query, &filters, request.limit, request.offset)
                    .await
            }
            _ => {
                self.text_search(query, &filters, request.limit, request.offset)
                    .await
            }
        }
    }

    /// Filters applied to every search: exact namespace match (search does
    /// not recurse into child namespaces), TTL liveness, and one equality
    /// predicate per metadata key/value pair.
    fn build_filters(&self, namespace: &NamespacePath, metadata: Option<&Payload>) -> Vec<Value> {
        let mut filters = vec![
            json!({"term": {"namespace_key": namespace.namespace_key()}}),
            TtlManager::liveness_clause(Utc::now()),
        ];
        if let Some(metadata) = metadata {
            for (key, value) in metadata {
                let mut term = serde_json::Map::new();
                term.insert(format!("doc.{key}"), value.clone());
                filters.push(json!({"term": term}));
            }
        }
        filters
    }

    /// Relevance-ranked lexical search, or match-everything when no query
    /// string is given.
    async fn text_search(
        &self,
        query: Option<&str>,
        filters: &[Value],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Hit>, StoreError> {
        let must = match query {
            Some(q) if !q.is_empty() => json!({"match": {"doc": q}}),
            _ => json!({"match_all": {}}),
        };
        let body = json!({
            "from": offset,
            "size": limit,
            "query": {"bool": {"must": must, "filter": filters}},
        });
        let response = self
            .engine
            .search(&self.settings.data_index_alias(), body)
            .await?;
        Ok(response.into_hits())
    }

    /// Approximate-nearest-neighbor search over the query embedding.
    /// Falls back to lexical search without an embedder or query string.
    /// The ANN primitive returns one global ranked list, so offset/limit
    /// are sliced client-side after retrieval.
    async fn vector_search(
        &self,
        query: Option<&str>,
        filters: &[Value],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Hit>, StoreError> {
        let (Some(embedder), Some(text)) = (
            self.embedder.as_ref(),
            query.filter(|q| !q.is_empty()),
        ) else {
            return self.text_search(query, filters, limit, offset).await;
        };
        let vector = embedder.embed_query(text).await?;
        let k = limit + offset;
        let body = self.knn_body(vector, k, filters);
        let response = self
            .engine
            .search(&self.settings.data_index_alias(), body)
            .await?;
        let hits = response.into_hits();
        Ok(hits.into_iter().skip(offset).take(limit).collect())
    }

    /// Lexical and vector retrieval executed independently for
    /// `limit + offset` candidates each, fused by reciprocal rank, then
    /// sliced once.
    async fn hybrid_search(
        &self,
        query: Option<&str>,
        filters: &[Value],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Hit>, StoreError> {
        let depth = limit + offset;
        let text_hits = self.text_search(query, filters, depth, 0).await?;
        let vector_hits = self.vector_search(query, filters, depth, 0).await?;
        let fused = fuse_by_rank(&[(&text_hits, FUSION_WEIGHT), (&vector_hits, FUSION_WEIGHT)]);
        Ok(fused.into_iter().skip(offset).take(limit).collect())
    }

    /// ANN query body. Candidate breadth is the larger of `2k` and the
    /// configured floor, mapped to the engine's search-breadth parameter
    /// and never narrower than `k` itself.
    fn knn_body(&self, vector: Vec<f32>, k: usize, filters: &[Value]) -> Value {
        let num_candidates = (2 * k).max(self.settings.search_num_candidates);
        let ef_search = num_candidates.max(k.max(1));
        let mut clause = json!({
            "vector": vector,
            "k": k,
            "method_parameters": {"ef_search": ef_search},
            "filter": {"bool": {"filter": filters}},
        });
        if let Some(threshold) = self.settings.search_similarity_threshold {
            clause["min_score"] = json!(threshold);
        }
        json!({
            "size": k,
            "query": {"knn": {"embedding": clause}},
        })
    }
}

/// Fuse ranked lists by reciprocal-rank scoring.
///
/// Scores accumulate per document id across lists; the fused order sorts
/// by descending score with ties broken by first-seen retrieval order
/// (stable sort). The returned hits carry their fused score.
pub fn fuse_by_rank(lists: &[(&[Hit], f64)]) -> Vec<Hit> {
    let mut order: Vec<String> = Vec::new();
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut hits: HashMap<String, Hit> = HashMap::new();

    for (list, weight) in lists {
        for (index, hit) in list.iter().enumerate() {
            let rank = index + 1;
            if !scores.contains_key(&hit.id) {
                order.push(hit.id.clone());
                hits.insert(hit.id.clone(), hit.clone());
            }
            *scores.entry(hit.id.clone()).or_insert(0.0) += weight / (rank as f64 + 1.0);
        }
    }

    let mut ranked: Vec<(String, f64)> = order
        .into_iter()
        .map(|id| {
            let score = scores[&id];
            (id, score)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    ranked
        .into_iter()
        .filter_map(|(id, score)| {
            hits.remove(&id).map(|mut hit| {
                hit.score = Some(score);
                hit
            })
        })
        .collect()
}
