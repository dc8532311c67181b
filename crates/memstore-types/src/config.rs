//! Configuration loading for memstore.
//!
//! Layered precedence: built-in defaults -> config file
//! (~/.config/memstore/config.toml) -> environment variables (MEMSTORE_*).
//! CLI flags are applied by the caller after loading.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TypesError;

/// Version stamped into index template names and reported by health.
pub const TEMPLATE_VERSION: u32 = 1;

/// Search mode the retrieval planner runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Hybrid when a query string and an embeddings provider are both
    /// present, lexical otherwise.
    #[default]
    Auto,
    /// Lexical relevance ranking only
    Text,
    /// Approximate-nearest-neighbor ranking only
    Vector,
    /// Lexical and vector rankings fused by reciprocal rank
    Hybrid,
}

impl SearchMode {
    /// Display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Auto => "auto",
            SearchMode::Text => "text",
            SearchMode::Vector => "vector",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SearchMode::Auto),
            "text" => Ok(SearchMode::Text),
            "vector" => Ok(SearchMode::Vector),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(TypesError::Config(format!("unknown search mode: {other}"))),
        }
    }
}

/// Embeddings provider configuration.
///
/// The provider is a remote REST endpoint; when no API key is configured
/// the store runs without semantic indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider name (e.g., "openai")
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model name (e.g., "text-embedding-3-small")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key (loaded from env var, not stored in config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            api_key: None,
            api_base_url: None,
        }
    }
}

/// Main store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Search engine endpoints. Hosts without a scheme get `https://`.
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// Basic-auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Verify TLS certificates
    #[serde(default = "default_verify_certs")]
    pub verify_certs: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Prefix for all index names owned by this store
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Embeddings provider configuration
    #[serde(default)]
    pub embeddings: EmbeddingSettings,

    /// Search mode
    #[serde(default)]
    pub search_mode: SearchMode,

    /// Floor for ANN candidate breadth
    #[serde(default = "default_search_num_candidates")]
    pub search_num_candidates: usize,

    /// Optional similarity cutoff for vector hits
    #[serde(default)]
    pub search_similarity_threshold: Option<f32>,

    /// Default TTL in minutes applied to puts that don't specify one.
    /// `None` means records never expire unless a put asks for a TTL.
    #[serde(default)]
    pub ttl_minutes_default: Option<f64>,

    /// Refresh TTL deadlines on every read
    #[serde(default)]
    pub ttl_refresh_on_read: bool,

    /// Emit a structured log line per operation
    #[serde(default = "default_log_operations")]
    pub log_operations: bool,

    /// Report operation timings through the metrics sink
    #[serde(default)]
    pub metrics_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_hosts() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_verify_certs() -> bool {
    true
}

fn default_timeout_secs() -> f64 {
    30.0
}

fn default_index_prefix() -> String {
    "memstore".to_string()
}

fn default_embedding_dim() -> usize {
    1536
}

fn default_search_num_candidates() -> usize {
    200
}

fn default_log_operations() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            username: None,
            password: None,
            verify_certs: default_verify_certs(),
            timeout_secs: default_timeout_secs(),
            index_prefix: default_index_prefix(),
            embedding_dim: default_embedding_dim(),
            embeddings: EmbeddingSettings::default(),
            search_mode: SearchMode::default(),
            search_num_candidates: default_search_num_candidates(),
            search_similarity_threshold: None,
            ttl_minutes_default: None,
            ttl_refresh_on_read: false,
            log_operations: default_log_operations(),
            metrics_enabled: false,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/memstore/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (MEMSTORE_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "memstore")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("hosts", default_hosts())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("verify_certs", default_verify_certs())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("timeout_secs", default_timeout_secs())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("index_prefix", default_index_prefix())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("embedding_dim", default_embedding_dim() as i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("search_num_candidates", default_search_num_candidates() as i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("log_operations", default_log_operations())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MEMSTORE_HOSTS, MEMSTORE_USERNAME, MEMSTORE_TTL_MINUTES_DEFAULT, ...
        builder = builder.add_source(
            Environment::with_prefix("MEMSTORE")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("hosts"),
        );

        let config = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))
    }

    /// Validate settings that must be caught at startup, before any engine
    /// call is attempted.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.hosts.is_empty() {
            return Err(TypesError::Config(
                "at least one engine host is required".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(TypesError::Config(
                "username and password must be set together".to_string(),
            ));
        }
        if self.embedding_dim == 0 {
            return Err(TypesError::Config(
                "embedding_dim must be positive".to_string(),
            ));
        }
        if self.timeout_secs <= 0.0 {
            return Err(TypesError::Config(
                "timeout_secs must be positive".to_string(),
            ));
        }
        if let Some(threshold) = self.search_similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(TypesError::Config(format!(
                    "search_similarity_threshold must be 0.0-1.0, got {threshold}"
                )));
            }
        }
        Ok(())
    }

    /// Hosts normalized to URLs (scheme-less entries become https).
    pub fn host_urls(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|host| {
                if host.starts_with("http://") || host.starts_with("https://") {
                    host.clone()
                } else {
                    format!("https://{host}")
                }
            })
            .collect()
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    /// Alias the data index is addressed through.
    pub fn data_index_alias(&self) -> String {
        format!("{}-data", self.index_prefix)
    }

    /// Concrete index the alias is bootstrapped onto.
    pub fn data_index_bootstrap(&self) -> String {
        format!(
            "{}-data-v{:02}-000001",
            self.index_prefix, TEMPLATE_VERSION
        )
    }

    /// Index holding per-namespace aggregates.
    pub fn namespace_index_name(&self) -> String {
        format!("{}-namespace", self.index_prefix)
    }

    /// Name of the data index template.
    pub fn template_name(&self) -> String {
        format!("{}-data-template-v{}", self.index_prefix, TEMPLATE_VERSION)
    }
}
