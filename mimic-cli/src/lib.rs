//! # mimic-cli
//!
//! Argument parsing and engine bootstrap for the `mimic` binary.

pub mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use learning::StyleEngine;
use mimic_core::StyleConfig;
use storage::SqliteStyleStore;

pub use cli::{Cli, Commands};

/// Opens the SQLite store named by `database.url` and an engine over it, restoring the
/// persisted counters.
pub async fn open_engine(config: StyleConfig) -> Result<StyleEngine> {
    let store = SqliteStyleStore::new(&config.database.url)
        .await
        .with_context(|| format!("Open database {}", config.database.url))?;
    let engine = StyleEngine::open(config, Arc::new(store))
        .await
        .context("Restore engine statistics")?;
    Ok(engine)
}
