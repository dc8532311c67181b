//! In-memory mock engine for testing.
//!
//! Implements [`SearchEngine`] over hash maps, interpreting the query-DSL
//! subset the store emits: `term`, `prefix`, `exists`, `range`, `match`,
//! `match_all`, `bool`, and `knn` clauses, plus field sorts, `from`/`size`
//! paging, scripted counter upserts, and bounded delete-by-query. Useful
//! for exercising the full store without a running engine.
//!
//! Scripted updates are interpreted structurally rather than by executing
//! the script source: the parameter object carries a counter delta and
//! descriptor fields, which is the one script shape this workspace emits.
//! The arithmetic runs under the state lock, mirroring the engine's
//! per-document atomicity.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};

use crate::api::SearchEngine;
use crate::error::EngineError;
use crate::response::{Hit, SearchResponse};

/// Deterministic in-memory engine.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    /// index name -> document id -> body. BTreeMap keeps iteration, and
    /// therefore tie-breaking, deterministic.
    indices: HashMap<String, BTreeMap<String, Value>>,
    /// alias -> index name
    aliases: HashMap<String, String>,
    templates: HashMap<String, Value>,
    /// "repository/snapshot" -> captured indices
    snapshots: HashMap<String, HashMap<String, BTreeMap<String, Value>>>,
}

impl MockState {
    fn resolve(&self, name: &str) -> String {
        self.aliases.get(name).cloned().unwrap_or_else(|| name.to_string())
    }

    fn documents(&self, name: &str) -> BTreeMap<String, Value> {
        let resolved = self.resolve(name);
        self.indices.get(&resolved).cloned().unwrap_or_default()
    }

    fn documents_mut(&mut self, name: &str) -> &mut BTreeMap<String, Value> {
        let resolved = self.resolve(name);
        self.indices.entry(resolved).or_default()
    }
}

impl MockEngine {
    /// Create an empty mock engine.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Descend a dotted field path into a document.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Chronological/numeric/lexicographic comparison of two JSON values.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_str(), b.as_str()) {
        if let (Ok(a), Ok(b)) = (
            DateTime::parse_from_rfc3339(a),
            DateTime::parse_from_rfc3339(b),
        ) {
            return Some(a.cmp(&b));
        }
        return Some(a.cmp(b));
    }
    if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
        return a.partial_cmp(&b);
    }
    None
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Collect every string value nested under a JSON value.
fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_text(item, out)),
        _ => {}
    }
}

fn vector_of(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_f64).collect())
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn clause_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => vec![],
        other => vec![other],
    }
}

/// Evaluate a query clause against a document. `Some(score)` on match.
fn eval(query: &Value, doc: &Value) -> Option<f64> {
    let object = query.as_object()?;
    let (kind, clause) = object.iter().next()?;
    match kind.as_str() {
        "match_all" => Some(1.0),
        "term" => {
            let (field, expected) = clause.as_object()?.iter().next()?;
            let expected = expected.get("value").unwrap_or(expected);
            (lookup(doc, field) == Some(expected)).then_some(1.0)
        }
        "prefix" => {
            let (field, prefix) = clause.as_object()?.iter().next()?;
            let prefix = prefix.get("value").unwrap_or(prefix).as_str()?;
            lookup(doc, field)?
                .as_str()?
                .starts_with(prefix)
                .then_some(1.0)
        }
        "exists" => {
            let field = clause.get("field")?.as_str()?;
            lookup(doc, field).map(|_| 1.0)
        }
        "range" => {
            let (field, bounds) = clause.as_object()?.iter().next()?;
            let value = lookup(doc, field)?;
            for (bound, limit) in bounds.as_object()? {
                let ordering = compare(value, limit)?;
                let ok = match bound.as_str() {
                    "gt" => ordering == Ordering::Greater,
                    "gte" => ordering != Ordering::Less,
                    "lt" => ordering == Ordering::Less,
                    "lte" => ordering != Ordering::Greater,
                    _ => return None,
                };
                if !ok {
                    return None;
                }
            }
            Some(1.0)
        }
        "match" => {
            let (field, text) = clause.as_object()?.iter().next()?;
            let text = text.get("query").unwrap_or(text).as_str()?;
            let field_value = lookup(doc, field)?;
            let mut haystack = Vec::new();
            collect_text(field_value, &mut haystack);
            let doc_tokens = tokens(&haystack.join(" "));
            let overlap = tokens(text)
                .iter()
                .filter(|token| doc_tokens.contains(token))
                .count();
            (overlap > 0).then_some(overlap as f64)
        }
        "bool" => {
            let mut score = 0.0;
            for sub in clause_list(clause.get("must").unwrap_or(&Value::Null)) {
                score += eval(sub, doc)?;
            }
            for sub in clause_list(clause.get("filter").unwrap_or(&Value::Null)) {
                eval(sub, doc)?;
            }
            for sub in clause_list(clause.get("must_not").unwrap_or(&Value::Null)) {
                if eval(sub, doc).is_some() {
                    return None;
                }
            }
            let shoulds = clause_list(clause.get("should").unwrap_or(&Value::Null));
            if !shoulds.is_empty() {
                let minimum = clause
                    .get("minimum_should_match")
                    .and_then(Value::as_u64)
                    .unwrap_or(1) as usize;
                let mut matched = 0;
                for sub in &shoulds {
                    if let Some(sub_score) = eval(sub, doc) {
                        matched += 1;
                        score += sub_score;
                    }
                }
                if matched < minimum {
                    return None;
                }
            }
            Some(score)
        }
        _ => None,
    }
}

fn sort_specs(sort: &Value) -> Vec<(String, bool)> {
    clause_list(sort)
        .into_iter()
        .filter_map(|spec| {
            let (field, order) = spec.as_object()?.iter().next()?;
            let ascending = match order {
                Value::String(s) => s == "asc",
                Value::Object(map) => {
                    map.get("order").and_then(Value::as_str).unwrap_or("asc") == "asc"
                }
                _ => true,
            };
            Some((field.clone(), ascending))
        })
        .collect()
}

fn knn_hits(documents: &BTreeMap<String, Value>, knn: &Value) -> Result<Vec<Hit>, EngineError> {
    let (field, clause) = knn
        .as_object()
        .and_then(|map| map.iter().next())
        .ok_or_else(|| EngineError::InvalidRequest("empty knn clause".to_string()))?;
    let query_vector = clause
        .get("vector")
        .and_then(vector_of)
        .ok_or_else(|| EngineError::InvalidRequest("knn clause missing vector".to_string()))?;
    let k = clause.get("k").and_then(Value::as_u64).unwrap_or(10) as usize;
    let min_score = clause.get("min_score").and_then(Value::as_f64);
    let filter = clause.get("filter");

    let mut scored: Vec<Hit> = Vec::new();
    for (id, doc) in documents {
        if let Some(filter) = filter {
            if eval(filter, doc).is_none() {
                continue;
            }
        }
        let Some(embedding) = doc.get(field.as_str()).and_then(vector_of) else {
            continue;
        };
        let similarity = cosine(&query_vector, &embedding);
        if min_score.is_some_and(|cutoff| similarity < cutoff) {
            continue;
        }
        scored.push(Hit {
            id: id.clone(),
            score: Some(similarity),
            source: doc.clone(),
        });
    }
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(k);
    Ok(scored)
}

#[async_trait]
impl SearchEngine for MockEngine {
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, EngineError> {
        let state = self.state.lock().unwrap();
        Ok(state.documents(index).get(id).cloned())
    }

    async fn document_exists(&self, index: &str, id: &str) -> Result<bool, EngineError> {
        let state = self.state.lock().unwrap();
        Ok(state.documents(index).contains_key(id))
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: Value,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.documents_mut(index).insert(id.to_string(), document);
        Ok(())
    }

    async fn update_document(&self, index: &str, id: &str, body: Value) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let documents = state.documents_mut(index);
        if body.get("script").is_some() {
            let params = body
                .pointer("/script/params")
                .cloned()
                .unwrap_or_else(|| json!({}));
            if let Some(existing) = documents.get_mut(id) {
                let delta = params.get("delta").and_then(Value::as_i64).unwrap_or(0);
                let current = existing.get("doc_count").and_then(Value::as_i64).unwrap_or(0);
                existing["doc_count"] = json!((current + delta).max(0));
                for field in ["namespace", "namespace_key", "depth", "updated_at"] {
                    if let Some(value) = params.get(field) {
                        existing[field] = value.clone();
                    }
                }
            } else {
                let upsert = body.get("upsert").cloned().ok_or_else(|| {
                    EngineError::InvalidRequest("scripted update without upsert body".to_string())
                })?;
                documents.insert(id.to_string(), upsert);
            }
            return Ok(());
        }
        if let Some(partial) = body.get("doc").and_then(Value::as_object) {
            let existing = documents
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(format!("{index}/{id}")))?;
            for (key, value) in partial {
                existing[key] = value.clone();
            }
            return Ok(());
        }
        Err(EngineError::InvalidRequest(
            "update body must carry a script or a partial doc".to_string(),
        ))
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, EngineError> {
        let mut state = self.state.lock().unwrap();
        Ok(state.documents_mut(index).remove(id).is_some())
    }

    async fn search(&self, index: &str, body: Value) -> Result<SearchResponse, EngineError> {
        let documents = {
            let state = self.state.lock().unwrap();
            state.documents(index)
        };
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;

        if let Some(knn) = body.pointer("/query/knn") {
            let mut hits = knn_hits(&documents, knn)?;
            hits = hits.into_iter().skip(from).take(size).collect();
            return Ok(SearchResponse::from_hits(hits));
        }

        let match_all = json!({"match_all": {}});
        let query = body.get("query").unwrap_or(&match_all);
        let mut hits: Vec<Hit> = documents
            .iter()
            .filter_map(|(id, doc)| {
                eval(query, doc).map(|score| Hit {
                    id: id.clone(),
                    score: Some(score),
                    source: doc.clone(),
                })
            })
            .collect();

        if let Some(sort) = body.get("sort") {
            let specs = sort_specs(sort);
            hits.sort_by(|a, b| {
                for (field, ascending) in &specs {
                    let left = lookup(&a.source, field).unwrap_or(&Value::Null);
                    let right = lookup(&b.source, field).unwrap_or(&Value::Null);
                    let ordering = compare(left, right).unwrap_or(Ordering::Equal);
                    let ordering = if *ascending { ordering } else { ordering.reverse() };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
            for hit in &mut hits {
                hit.score = None;
            }
        } else {
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let hits = hits.into_iter().skip(from).take(size).collect();
        Ok(SearchResponse::from_hits(hits))
    }

    async fn delete_by_query(&self, index: &str, body: Value) -> Result<u64, EngineError> {
        let mut state = self.state.lock().unwrap();
        let documents = state.documents_mut(index);
        let match_all = json!({"match_all": {}});
        let query = body.get("query").unwrap_or(&match_all);
        let max_docs = body
            .get("max_docs")
            .and_then(Value::as_u64)
            .unwrap_or(u64::MAX) as usize;
        let matching: Vec<String> = documents
            .iter()
            .filter(|(_, doc)| eval(query, doc).is_some())
            .map(|(id, _)| id.clone())
            .take(max_docs)
            .collect();
        for id in &matching {
            documents.remove(id);
        }
        Ok(matching.len() as u64)
    }

    async fn count(&self, index: &str, query: Option<Value>) -> Result<u64, EngineError> {
        let state = self.state.lock().unwrap();
        let documents = state.documents(index);
        let query = query.unwrap_or_else(|| json!({"match_all": {}}));
        Ok(documents
            .values()
            .filter(|doc| eval(&query, doc).is_some())
            .count() as u64)
    }

    async fn cluster_health(&self) -> Result<Value, EngineError> {
        Ok(json!({"status": "green", "number_of_nodes": 1}))
    }

    async fn cluster_info(&self) -> Result<Value, EngineError> {
        Ok(json!({
            "name": "mock-engine",
            "version": {"distribution": "opensearch", "number": "3.0.0"}
        }))
    }

    async fn index_exists(&self, index: &str) -> Result<bool, EngineError> {
        let state = self.state.lock().unwrap();
        let resolved = state.resolve(index);
        Ok(state.indices.contains_key(&resolved))
    }

    async fn create_index(&self, index: &str, _body: Value) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.indices.entry(index.to_string()).or_default();
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.indices.entry(index.to_string()).or_default();
        state.aliases.insert(alias.to_string(), index.to_string());
        Ok(())
    }

    async fn put_index_template(&self, name: &str, body: Value) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.templates.insert(name.to_string(), body);
        Ok(())
    }

    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: Option<Value>,
        _wait: bool,
    ) -> Result<Value, EngineError> {
        let mut state = self.state.lock().unwrap();
        let selection: Option<Vec<String>> = body
            .as_ref()
            .and_then(|b| b.get("indices"))
            .and_then(Value::as_str)
            .map(|list| list.split(',').map(|s| s.trim().to_string()).collect());
        let captured: HashMap<String, BTreeMap<String, Value>> = state
            .indices
            .iter()
            .filter(|(name, _)| {
                selection
                    .as_ref()
                    .map(|wanted| wanted.contains(name))
                    .unwrap_or(true)
            })
            .map(|(name, docs)| (name.clone(), docs.clone()))
            .collect();
        state
            .snapshots
            .insert(format!("{repository}/{snapshot}"), captured);
        Ok(json!({"snapshot": {"snapshot": snapshot, "state": "SUCCESS"}}))
    }

    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        _body: Option<Value>,
        _wait: bool,
    ) -> Result<Value, EngineError> {
        let mut state = self.state.lock().unwrap();
        let key = format!("{repository}/{snapshot}");
        let captured = state
            .snapshots
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(key.clone()))?;
        for (name, docs) in captured {
            state.indices.insert(name, docs);
        }
        Ok(json!({"accepted": true}))
    }

    async fn delete_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
    ) -> Result<Value, EngineError> {
        let mut state = self.state.lock().unwrap();
        let key = format!("{repository}/{snapshot}");
        state
            .snapshots
            .remove(&key)
            .ok_or_else(|| EngineError::NotFound(key.clone()))?;
        Ok(json!({"acknowledged": true}))
    }
}
