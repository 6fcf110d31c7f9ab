//! Error types for the sync engine
//!
//! Only configuration, catalog, snapshot-read and write failures surface
//! here. Cell coercion never fails and lookup failures are absorbed by the
//! resolver, so neither has a variant.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Store endpoint, credential, or batch settings are missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    /// Table catalog could not be loaded or failed validation
    #[error("Invalid table catalog: {0}")]
    Catalog(String),

    /// Snapshot file exists but could not be parsed
    #[error("Failed to read snapshot '{}': {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A write batch was rejected; earlier batches of the table stay committed
    #[error("Write to '{table}' failed at batch {batch} ({committed} records already committed): {source}")]
    Write {
        table: String,
        batch: usize,
        committed: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a snapshot read error
    pub fn snapshot(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Snapshot {
            path: path.into(),
            source,
        }
    }

    /// Create a write error for the given batch
    pub fn write(table: impl Into<String>, batch: usize, committed: usize, source: StoreError) -> Self {
        Self::Write {
            table: table.into(),
            batch,
            committed,
            source,
        }
    }

    /// Whether this error happened before any table was touched
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Catalog(_))
    }
}
