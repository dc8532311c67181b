//! # memstore-cli
//!
//! Operational CLI for memstore: setup, health, statistics, TTL sweeps,
//! record access, search, namespace listings, and snapshot administration.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, SnapshotCommands};
pub use commands::{build_store, run};
