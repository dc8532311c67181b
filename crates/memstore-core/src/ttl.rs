//! TTL lifecycle management.
//!
//! A record with a TTL is ACTIVE until its deadline passes, EXPIRED once
//! `now >= ttl_expires_at`, and purged by whichever comes first: the next
//! read that observes it, or a bulk sweep. Records without a TTL never
//! expire. Expired-but-unpurged documents are additionally excluded from
//! search by a liveness filter clause, so they are never ranked.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use memstore_engine::SearchEngine;
use memstore_types::Settings;

use crate::codec::{expiry_deadline, StoredDocument};
use crate::error::StoreError;

/// Result of one bulk sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    /// Documents deleted by this sweep
    pub deleted: u64,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// When the sweep ran
    pub ran_at: DateTime<Utc>,
}

/// TTL configuration and sweep status, reported by health.
#[derive(Debug, Clone, Serialize)]
pub struct TtlStatus {
    /// Whether a default TTL is configured
    pub enabled: bool,
    /// Whether reads refresh deadlines by default
    pub refresh_on_read: bool,
    /// Default TTL duration in minutes
    pub default_ttl_minutes: Option<f64>,
    /// Last sweep on this instance, if any
    pub last_sweep: Option<SweepOutcome>,
}

/// Manages record expiry, refresh, and bulk sweeping.
pub struct TtlManager {
    engine: Arc<dyn SearchEngine>,
    settings: Arc<Settings>,
    last_sweep: Mutex<Option<SweepOutcome>>,
}

impl TtlManager {
    /// Create a manager.
    pub fn new(engine: Arc<dyn SearchEngine>, settings: Arc<Settings>) -> Self {
        Self {
            engine,
            settings,
            last_sweep: Mutex::new(None),
        }
    }

    /// Whether a document is past its deadline. Documents without a TTL
    /// are never expired.
    pub fn is_expired(document: &StoredDocument, now: DateTime<Utc>) -> bool {
        document
            .ttl_expires_at
            .is_some_and(|deadline| deadline <= now)
    }

    /// Filter clause excluding expired documents: no TTL field, or a
    /// deadline strictly in the future.
    pub fn liveness_clause(now: DateTime<Utc>) -> Value {
        json!({
            "bool": {
                "should": [
                    {"bool": {"must_not": {"exists": {"field": "ttl_expires_at"}}}},
                    {"range": {"ttl_expires_at": {"gt": now}}},
                ],
                "minimum_should_match": 1,
            }
        })
    }

    /// Refresh a record's deadline after a read, when asked for and the
    /// record carries a TTL. Writes only the deadline and `updated_at`
    /// back. Advisory: failures are swallowed with a log line and never
    /// affect the read that triggered the refresh.
    pub async fn maybe_refresh(
        &self,
        doc_id: &str,
        document: &StoredDocument,
        refresh_requested: Option<bool>,
    ) {
        if document.ttl_expires_at.is_none() {
            return;
        }
        if !(refresh_requested.unwrap_or(false) || self.settings.ttl_refresh_on_read) {
            return;
        }
        let Some(ttl_minutes) = document.ttl_minutes.or(self.settings.ttl_minutes_default) else {
            return;
        };
        let now = Utc::now();
        let body = json!({
            "doc": {
                "ttl_expires_at": expiry_deadline(now, ttl_minutes),
                "updated_at": now,
            }
        });
        let index = self.settings.data_index_alias();
        if let Err(err) = self.engine.update_document(&index, doc_id, body).await {
            debug!(doc_id, error = %err, "ttl refresh failed");
        }
    }

    /// Delete every record at or past its deadline, bounded by
    /// `batch_size` documents per invocation. Idempotent and lock-free:
    /// records already removed by lazy eviction are simply not found, and
    /// concurrent sweeps tolerate each other's write conflicts. Returns
    /// the deleted count.
    pub async fn sweep(&self, batch_size: u64) -> Result<u64, StoreError> {
        let now = Utc::now();
        let body = json!({
            "query": {"range": {"ttl_expires_at": {"lte": now}}},
            "max_docs": batch_size,
        });
        let start = Instant::now();
        let deleted = self
            .engine
            .delete_by_query(&self.settings.data_index_alias(), body)
            .await?;
        let outcome = SweepOutcome {
            deleted,
            duration_ms: start.elapsed().as_millis() as u64,
            ran_at: now,
        };
        info!(deleted, duration_ms = outcome.duration_ms, "ttl sweep complete");
        *self.last_sweep.lock().expect("ttl sweep status lock poisoned") = Some(outcome);
        Ok(deleted)
    }

    /// Current TTL configuration plus last sweep outcome.
    pub fn status(&self) -> TtlStatus {
        TtlStatus {
            enabled: self.settings.ttl_minutes_default.is_some(),
            refresh_on_read: self.settings.ttl_refresh_on_read,
            default_ttl_minutes: self.settings.ttl_minutes_default,
            last_sweep: self
                .last_sweep
                .lock()
                .expect("ttl sweep status lock poisoned")
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use memstore_types::Payload;

    fn document(ttl_expires_at: Option<DateTime<Utc>>, ttl_minutes: Option<f64>) -> StoredDocument {
        StoredDocument {
            namespace: vec!["a".to_string()],
            namespace_key: "a".to_string(),
            depth: 1,
            key: "k".to_string(),
            doc: Payload::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ttl_expires_at,
            ttl_minutes,
            embedding: None,
        }
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let doc = document(None, None);
        assert!(!TtlManager::is_expired(&doc, Utc::now() + Duration::days(10_000)));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let doc = document(Some(now), Some(1.0));
        assert!(TtlManager::is_expired(&doc, now));
        assert!(!TtlManager::is_expired(&doc, now - Duration::seconds(1)));
    }

    #[test]
    fn test_liveness_clause_shape() {
        let clause = TtlManager::liveness_clause(Utc::now());
        let shoulds = clause["bool"]["should"].as_array().unwrap();
        assert_eq!(shoulds.len(), 2);
        assert_eq!(clause["bool"]["minimum_should_match"], json!(1));
    }
}
