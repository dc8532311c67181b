//! HTTP implementation of the engine interface.
//!
//! One reqwest client, hosts rotated round-robin so retries move to the
//! next endpoint. Transient failures (transport errors and 429/502/503/504)
//! are retried a bounded number of times with exponential backoff before
//! surfacing to the caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use memstore_types::Settings;

use crate::api::SearchEngine;
use crate::error::EngineError;
use crate::response::SearchResponse;

/// Status codes retried as transient.
const RETRY_STATUS: [u16; 4] = [429, 502, 503, 504];

/// Initial try plus three retries.
const MAX_ATTEMPTS: usize = 4;

/// HTTP engine client.
pub struct HttpEngine {
    client: Client,
    hosts: Vec<Url>,
    username: Option<String>,
    password: Option<SecretString>,
    cursor: AtomicUsize,
}

impl HttpEngine {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` for unparseable hosts and
    /// `EngineError::Transport` when the underlying client cannot be
    /// constructed.
    pub fn from_settings(settings: &Settings) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .danger_accept_invalid_certs(!settings.verify_certs)
            .build()?;
        let hosts = settings
            .host_urls()
            .iter()
            .map(|host| {
                Url::parse(host)
                    .map_err(|err| EngineError::Config(format!("invalid host {host:?}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if hosts.is_empty() {
            return Err(EngineError::Config(
                "at least one engine host is required".to_string(),
            ));
        }
        Ok(Self {
            client,
            hosts,
            username: settings.username.clone(),
            password: settings.password.clone(),
            cursor: AtomicUsize::new(0),
        })
    }

    fn next_host(&self) -> &Url {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        &self.hosts[index]
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.next_host().clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| EngineError::Config("engine host cannot be a base URL".to_string()))?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    /// Send a request with bounded retries for transient failures.
    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, EngineError> {
        let attempts = AtomicUsize::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(Duration::from_secs(30)))
            .build();
        backoff::future::retry(policy, || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            let method = method.clone();
            async move {
                let url = self.url_for(segments).map_err(backoff::Error::permanent)?;
                let mut request = self.client.request(method, url);
                if !query.is_empty() {
                    request = request.query(query);
                }
                if let (Some(username), Some(password)) = (&self.username, &self.password) {
                    request = request.basic_auth(username, Some(password.expose_secret()));
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                let response = request.send().await.map_err(|err| {
                    warn!(path = segments.join("/"), attempt, error = %err, "engine transport failure");
                    classify(attempt, EngineError::Transport(err))
                })?;
                let status = response.status();
                if RETRY_STATUS.contains(&status.as_u16()) {
                    warn!(path = segments.join("/"), attempt, status = status.as_u16(), "engine returned retryable status");
                    return Err(classify(
                        attempt,
                        EngineError::Status {
                            status: status.as_u16(),
                            reason: status.canonical_reason().unwrap_or("retryable").to_string(),
                        },
                    ));
                }
                Ok(response)
            }
        })
        .await
    }

    async fn fail(response: reqwest::Response) -> EngineError {
        let status = response.status().as_u16();
        let reason = response.text().await.unwrap_or_default();
        EngineError::Status { status, reason }
    }
}

fn classify(attempt: usize, err: EngineError) -> backoff::Error<EngineError> {
    if attempt + 1 >= MAX_ATTEMPTS {
        backoff::Error::permanent(err)
    } else {
        backoff::Error::transient(err)
    }
}

#[async_trait]
impl SearchEngine for HttpEngine {
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, EngineError> {
        let response = self
            .send(Method::GET, &[index, "_doc", id], &[], None)
            .await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let envelope: Value = response.json().await?;
        Ok(envelope.get("_source").cloned())
    }

    async fn document_exists(&self, index: &str, id: &str) -> Result<bool, EngineError> {
        let response = self
            .send(Method::HEAD, &[index, "_doc", id], &[], None)
            .await?;
        match response.status().as_u16() {
            404 => Ok(false),
            status if (200..300).contains(&status) => Ok(true),
            _ => Err(Self::fail(response).await),
        }
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: Value,
    ) -> Result<(), EngineError> {
        let response = self
            .send(Method::PUT, &[index, "_doc", id], &[], Some(&document))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn update_document(&self, index: &str, id: &str, body: Value) -> Result<(), EngineError> {
        let response = self
            .send(Method::POST, &[index, "_update", id], &[], Some(&body))
            .await?;
        if response.status().as_u16() == 404 {
            return Err(EngineError::NotFound(format!("{index}/{id}")));
        }
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, EngineError> {
        let response = self
            .send(Method::DELETE, &[index, "_doc", id], &[], None)
            .await?;
        match response.status().as_u16() {
            404 => Ok(false),
            status if (200..300).contains(&status) => Ok(true),
            _ => Err(Self::fail(response).await),
        }
    }

    async fn search(&self, index: &str, body: Value) -> Result<SearchResponse, EngineError> {
        let response = self
            .send(Method::POST, &[index, "_search"], &[], Some(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }

    async fn delete_by_query(&self, index: &str, body: Value) -> Result<u64, EngineError> {
        let query = [
            ("conflicts", "proceed".to_string()),
            ("slices", "auto".to_string()),
        ];
        let response = self
            .send(Method::POST, &[index, "_delete_by_query"], &query, Some(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let result: Value = response.json().await?;
        Ok(result.get("deleted").and_then(Value::as_u64).unwrap_or(0))
    }

    async fn count(&self, index: &str, query: Option<Value>) -> Result<u64, EngineError> {
        let body = query.map(|q| serde_json::json!({ "query": q }));
        let response = self
            .send(Method::POST, &[index, "_count"], &[], body.as_ref())
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let result: Value = response.json().await?;
        Ok(result.get("count").and_then(Value::as_u64).unwrap_or(0))
    }

    async fn cluster_health(&self) -> Result<Value, EngineError> {
        let response = self
            .send(Method::GET, &["_cluster", "health"], &[], None)
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }

    async fn cluster_info(&self) -> Result<Value, EngineError> {
        let response = self.send(Method::GET, &[], &[], None).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }

    async fn index_exists(&self, index: &str) -> Result<bool, EngineError> {
        let response = self.send(Method::HEAD, &[index], &[], None).await?;
        match response.status().as_u16() {
            404 => Ok(false),
            status if (200..300).contains(&status) => Ok(true),
            _ => Err(Self::fail(response).await),
        }
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<(), EngineError> {
        let response = self.send(Method::PUT, &[index], &[], Some(&body)).await?;
        // A 400 here is an already-created index losing the creation race.
        if response.status().as_u16() == 400 {
            debug!(index, "index already exists");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<(), EngineError> {
        let response = self
            .send(Method::PUT, &[index, "_alias", alias], &[], None)
            .await?;
        if response.status().as_u16() == 404 {
            debug!(index, alias, "alias target missing");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn put_index_template(&self, name: &str, body: Value) -> Result<(), EngineError> {
        let response = self
            .send(Method::PUT, &["_index_template", name], &[], Some(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: Option<Value>,
        wait: bool,
    ) -> Result<Value, EngineError> {
        let query = [("wait_for_completion", wait.to_string())];
        let response = self
            .send(
                Method::PUT,
                &["_snapshot", repository, snapshot],
                &query,
                body.as_ref(),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }

    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: Option<Value>,
        wait: bool,
    ) -> Result<Value, EngineError> {
        let query = [("wait_for_completion", wait.to_string())];
        let response = self
            .send(
                Method::POST,
                &["_snapshot", repository, snapshot, "_restore"],
                &query,
                body.as_ref(),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }

    async fn delete_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
    ) -> Result<Value, EngineError> {
        let response = self
            .send(Method::DELETE, &["_snapshot", repository, snapshot], &[], None)
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_rejects_bad_host() {
        let settings = Settings {
            hosts: vec!["http://localhost:9200".to_string(), ":::".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            HttpEngine::from_settings(&settings),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_hosts_rotate_per_request() {
        let settings = Settings {
            hosts: vec![
                "http://one:9200".to_string(),
                "http://two:9200".to_string(),
            ],
            ..Default::default()
        };
        let engine = HttpEngine::from_settings(&settings).unwrap();
        let first = engine.next_host().clone();
        let second = engine.next_host().clone();
        let third = engine.next_host().clone();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let settings = Settings::default();
        let engine = HttpEngine::from_settings(&settings).unwrap();
        let url = engine
            .url_for(&["memstore-data", "_doc", "prefs::user 1::k"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/memstore-data/_doc/prefs::user%201::k"
        );
    }

    #[test]
    fn test_classify_bounds_attempts() {
        let err = classify(MAX_ATTEMPTS - 1, EngineError::Config("x".to_string()));
        assert!(matches!(err, backoff::Error::Permanent(_)));
        let err = classify(0, EngineError::Config("x".to_string()));
        assert!(matches!(err, backoff::Error::Transient { .. }));
    }
}
