//! Command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde_json::json;
use tracing::debug;

use memstore_core::{LogMetrics, MetricsSink, NamespaceStore, NoopMetrics, Store};
use memstore_embeddings::{EmbeddingProvider, RestEmbedder};
use memstore_engine::HttpEngine;
use memstore_types::{
    ListNamespacesRequest, NamespacePath, Payload, SearchMode, SearchRequest, Settings,
};

use crate::cli::{Cli, Commands, SnapshotCommands};

/// Load settings, apply CLI overrides, and construct the store.
pub fn build_store(cli: &Cli, search_mode: Option<SearchMode>) -> Result<Store> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(hosts) = &cli.hosts {
        settings.hosts = hosts.clone();
    }
    if let Some(username) = &cli.username {
        settings.username = Some(username.clone());
    }
    if let Some(password) = &cli.password {
        settings.password = Some(SecretString::from(password.clone()));
    }
    if let Some(prefix) = &cli.index_prefix {
        settings.index_prefix = prefix.clone();
    }
    if let Some(mode) = search_mode {
        settings.search_mode = mode;
    }
    settings.validate()?;

    let engine = Arc::new(HttpEngine::from_settings(&settings)?);
    let embedder: Option<Arc<dyn EmbeddingProvider>> = match settings.embeddings.api_key {
        Some(_) => Some(Arc::new(RestEmbedder::from_settings(
            &settings.embeddings,
            settings.embedding_dim,
        )?)),
        None => {
            debug!("no embeddings api key configured, semantic retrieval disabled");
            None
        }
    };
    let metrics: Arc<dyn MetricsSink> = if settings.metrics_enabled {
        Arc::new(LogMetrics)
    } else {
        Arc::new(NoopMetrics)
    };
    Ok(Store::new(settings, engine, embedder).with_metrics(metrics))
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Setup => {
            let store = build_store(&cli, None)?;
            store.setup().await?;
            print_json(&json!({"setup": "complete"}))
        }
        Commands::Health => {
            let store = build_store(&cli, None)?;
            print_json(&store.get_health().await?)
        }
        Commands::Stats => {
            let store = build_store(&cli, None)?;
            print_json(&store.get_stats().await?)
        }
        Commands::TtlSweep { batch_size } => {
            let store = build_store(&cli, None)?;
            let deleted = store.run_ttl_sweep(*batch_size).await?;
            print_json(&json!({"deleted": deleted}))
        }
        Commands::Put {
            namespace,
            key,
            value,
            ttl_minutes,
        } => {
            let store = build_store(&cli, None)?;
            let namespace: NamespacePath = namespace.parse()?;
            let value: Payload =
                serde_json::from_str(value).context("value must be a JSON object")?;
            store
                .put(namespace, key.clone(), value, *ttl_minutes)
                .await?;
            print_json(&json!({"stored": true}))
        }
        Commands::Get {
            namespace,
            key,
            refresh_ttl,
        } => {
            let store = build_store(&cli, None)?;
            let namespace: NamespacePath = namespace.parse()?;
            let item = store
                .get(namespace, key.clone(), refresh_ttl.then_some(true))
                .await?;
            print_json(&item)
        }
        Commands::Delete { namespace, key } => {
            let store = build_store(&cli, None)?;
            let namespace: NamespacePath = namespace.parse()?;
            store.delete(namespace, key.clone()).await?;
            print_json(&json!({"deleted": true}))
        }
        Commands::Search {
            namespace,
            query,
            filter,
            limit,
            offset,
            mode,
            refresh_ttl,
        } => {
            let mode = mode.as_deref().map(str::parse).transpose()?;
            let store = build_store(&cli, mode)?;
            let namespace: NamespacePath = namespace.parse()?;
            let filter: Option<Payload> = filter
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("filter must be a JSON object")?;
            let request = SearchRequest {
                namespace_prefix: namespace,
                query: query.clone(),
                filter,
                limit: *limit,
                offset: *offset,
                refresh_ttl: refresh_ttl.then_some(true),
            };
            print_json(&store.search(request).await?)
        }
        Commands::Namespaces {
            prefix,
            suffix,
            max_depth,
            limit,
            offset,
        } => {
            let store = build_store(&cli, None)?;
            let request = ListNamespacesRequest {
                prefix: prefix.as_deref().map(str::parse).transpose()?,
                suffix: suffix.as_deref().map(str::parse).transpose()?,
                max_depth: *max_depth,
                limit: *limit,
                offset: *offset,
            };
            print_json(&store.list_namespaces(request).await?)
        }
        Commands::Snapshot { command } => {
            let store = build_store(&cli, None)?;
            let response = match command {
                SnapshotCommands::Create {
                    repository,
                    snapshot,
                    indices,
                    no_wait,
                } => {
                    store
                        .create_snapshot(repository, snapshot, indices.clone(), !no_wait)
                        .await?
                }
                SnapshotCommands::Restore {
                    repository,
                    snapshot,
                    indices,
                    no_wait,
                } => {
                    store
                        .restore_snapshot(repository, snapshot, indices.clone(), !no_wait)
                        .await?
                }
                SnapshotCommands::Delete {
                    repository,
                    snapshot,
                } => store.delete_snapshot(repository, snapshot).await?,
            };
            print_json(&response)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
