//! CLI argument parsing.

use clap::{Parser, Subcommand};

/// memstore
///
/// A durable namespaced key-value and semantic memory store layered on an
/// external search engine.
#[derive(Parser, Debug)]
#[command(name = "memstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/memstore/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Engine hosts, comma-separated (overrides config)
    #[arg(long, global = true, value_delimiter = ',')]
    pub hosts: Option<Vec<String>>,

    /// Basic-auth username
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Basic-auth password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Index name prefix
    #[arg(long, global = true)]
    pub index_prefix: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Store commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install index templates and bootstrap indices (idempotent)
    Setup,

    /// Show engine health and TTL sweep status
    Health,

    /// Show store statistics
    Stats,

    /// Delete expired records in one bounded pass
    TtlSweep {
        /// Maximum documents deleted by this invocation
        #[arg(long, default_value_t = 1000)]
        batch_size: u64,
    },

    /// Write a record
    Put {
        /// Namespace path, `/`-separated (e.g. prefs/user_123)
        namespace: String,

        /// Record key
        key: String,

        /// Payload as a JSON object
        value: String,

        /// TTL in minutes; omitted records use the configured default
        #[arg(long)]
        ttl_minutes: Option<f64>,
    },

    /// Read a record
    Get {
        /// Namespace path, `/`-separated
        namespace: String,

        /// Record key
        key: String,

        /// Refresh the record's TTL deadline
        #[arg(long)]
        refresh_ttl: bool,
    },

    /// Delete a record
    Delete {
        /// Namespace path, `/`-separated
        namespace: String,

        /// Record key
        key: String,
    },

    /// Ranked search within a namespace
    Search {
        /// Namespace path, `/`-separated
        namespace: String,

        /// Query string; omitted means match everything
        query: Option<String>,

        /// Payload equality filters as a JSON object
        #[arg(long)]
        filter: Option<String>,

        /// Maximum results
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Results to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Override the configured search mode (text, vector, hybrid, auto)
        #[arg(long)]
        mode: Option<String>,

        /// Refresh TTL deadlines of returned records
        #[arg(long)]
        refresh_ttl: bool,
    },

    /// List namespaces
    Namespaces {
        /// Only namespaces under this `/`-separated prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Only namespaces ending with this `/`-separated suffix
        #[arg(long)]
        suffix: Option<String>,

        /// Truncate returned paths to this depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum paths to return
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Paths to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Snapshot administration
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
}

/// Snapshot subcommands
#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Create a snapshot in a repository
    Create {
        repository: String,
        snapshot: String,

        /// Indices to include, comma-separated (default: all)
        #[arg(long, value_delimiter = ',')]
        indices: Option<Vec<String>>,

        /// Return without waiting for completion
        #[arg(long)]
        no_wait: bool,
    },

    /// Restore a snapshot from a repository
    Restore {
        repository: String,
        snapshot: String,

        /// Indices to restore, comma-separated (default: all)
        #[arg(long, value_delimiter = ',')]
        indices: Option<Vec<String>>,

        /// Return without waiting for completion
        #[arg(long)]
        no_wait: bool,
    },

    /// Delete a snapshot
    Delete {
        repository: String,
        snapshot: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_put_args() {
        let cli = Cli::parse_from([
            "memstore",
            "put",
            "prefs/u1",
            "color",
            r#"{"text":"teal"}"#,
            "--ttl-minutes",
            "5",
        ]);
        match cli.command {
            Commands::Put {
                namespace,
                key,
                ttl_minutes,
                ..
            } => {
                assert_eq!(namespace, "prefs/u1");
                assert_eq!(key, "color");
                assert_eq!(ttl_minutes, Some(5.0));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_hosts_split() {
        let cli = Cli::parse_from([
            "memstore",
            "--hosts",
            "http://a:9200,http://b:9200",
            "health",
        ]);
        assert_eq!(
            cli.hosts,
            Some(vec![
                "http://a:9200".to_string(),
                "http://b:9200".to_string()
            ])
        );
    }
}
