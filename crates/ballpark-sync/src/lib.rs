//! Ballpark Sync Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Reconciles scraped baseball stat snapshots into the remote store.
//!
//! # Overview
//!
//! - **Catalog**: which tables to sync, where their snapshots live, and which
//!   columns are numeric (`tables`)
//! - **Reading**: CSV snapshots coerced into typed records (`snapshot`, `coerce`)
//! - **Resolution**: batched, bisecting lookups of existing keys (`resolver`)
//! - **Reconciliation**: lifecycle stamping and batched writes (`engine`)
//! - **Driving**: ordered table loop with per-mode failure policy (`driver`)
//! - **Store**: PostgREST client and an in-memory store (`store`)

pub mod coerce;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod record;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod tables;

// Re-export commonly used types
pub use driver::{Driver, RunPolicy, RunReport, TableStatus};
pub use engine::{ReconcileStats, ReconciliationEngine, SyncMode};
pub use error::{Result, SyncError};
pub use record::Record;
pub use tables::{TableCatalog, TableSpec};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use config::{DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DIR};

/// ballpark-sync - push scraped baseball snapshots into Supabase
#[derive(Parser, Debug)]
#[command(name = "ballpark-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Table catalog (TOML); the built-in catalog is used when absent
    #[arg(long, env = "BALLPARK_TABLES", global = true)]
    pub tables: Option<PathBuf>,

    /// Directory of master/reference snapshots
    #[arg(long, env = "BALLPARK_INPUT_DIR", default_value = DEFAULT_INPUT_DIR, global = true)]
    pub input_dir: PathBuf,

    /// Directory of transaction snapshots
    #[arg(long, env = "BALLPARK_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR, global = true)]
    pub output_dir: PathBuf,

    /// Restrict the run to these tables (repeatable)
    #[arg(long = "only", value_name = "TABLE", global = true)]
    pub only: Vec<String>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile snapshots into the store, keeping created_dt of existing rows
    Upsert,

    /// Bootstrap empty tables with plain inserts; stops at the first failure
    Load,

    /// Print the table catalog without contacting the store
    Tables,
}

impl Commands {
    /// Sync mode of the command, if it writes to the store
    pub fn mode(self) -> Option<SyncMode> {
        match self {
            Commands::Upsert => Some(SyncMode::Upsert),
            Commands::Load => Some(SyncMode::InsertOnly),
            Commands::Tables => None,
        }
    }
}

impl Cli {
    /// Resolve the catalog from `--tables` or the built-in one, then apply `--only`
    pub fn catalog(&self) -> Result<TableCatalog> {
        let catalog = match &self.tables {
            Some(path) => TableCatalog::load(path)?,
            None => TableCatalog::builtin(&self.input_dir, &self.output_dir),
        };

        catalog.select(&self.only)
    }
}
