//! Typed subset of the engine's search response format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ranked hit from a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    /// Document identifier
    #[serde(rename = "_id")]
    pub id: String,

    /// Engine relevance score. Absent when results are sorted by field
    /// instead of ranked.
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,

    /// The stored document body
    #[serde(rename = "_source", default)]
    pub source: Value,
}

/// Envelope around the hit list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitsEnvelope {
    /// Ranked hits in engine order
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// A search response, reduced to the parts the store consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: HitsEnvelope,
}

impl SearchResponse {
    /// Build a response from ranked hits.
    pub fn from_hits(hits: Vec<Hit>) -> Self {
        Self {
            hits: HitsEnvelope { hits },
        }
    }

    /// The ranked hit list.
    pub fn into_hits(self) -> Vec<Hit> {
        self.hits.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_engine_shape() {
        let raw = json!({
            "took": 3,
            "hits": {
                "total": {"value": 1, "relation": "eq"},
                "hits": [
                    {"_id": "a::k", "_score": 1.2, "_source": {"key": "k"}}
                ]
            }
        });
        let resp: SearchResponse = serde_json::from_value(raw).unwrap();
        let hits = resp.into_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a::k");
        assert_eq!(hits[0].score, Some(1.2));
    }

    #[test]
    fn test_sorted_hits_have_no_score() {
        let raw = json!({
            "hits": {"hits": [{"_id": "x", "_score": null, "_source": {}}]}
        });
        let resp: SearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.hits.hits[0].score, None);
    }
}
