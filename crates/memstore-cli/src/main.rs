//! memstore CLI entrypoint.
//!
//! # Usage
//!
//! ```bash
//! memstore setup
//! memstore put prefs/user_123 color '{"text": "favorite color is teal"}'
//! memstore search prefs/user_123 "favorite color" --limit 5
//! memstore ttl-sweep --batch-size 500
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/memstore/config.toml)
//! 3. Environment variables (MEMSTORE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use memstore_cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(cli.log_level.clone().unwrap_or_else(|| "info".to_string()))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}
