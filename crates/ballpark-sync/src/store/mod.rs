//! Remote store capability
//!
//! The sync engine needs three operations from the store: a keyed select, a
//! batch upsert keyed on `key`, and a batch insert. [`PostgrestStore`] speaks
//! the PostgREST dialect served by Supabase; [`MemoryStore`] is an in-process
//! implementation with fault injection for tests and offline runs.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::Record;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// A row returned by a select, as a JSON object
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Transport or store-side failure
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store rejected the request: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Filter on the `key` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// `key in (...)`
    In(Vec<String>),
    /// `key = ...`
    Eq(String),
}

impl KeyFilter {
    pub fn keys(&self) -> &[String] {
        match self {
            KeyFilter::In(keys) => keys,
            KeyFilter::Eq(key) => std::slice::from_ref(key),
        }
    }
}

/// Store operations the sync engine depends on
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Select `columns` from rows of `table` matching `filter`
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filter: &KeyFilter,
    ) -> Result<Vec<Row>, StoreError>;

    /// Insert-or-replace `rows`, keyed on `key`
    async fn upsert(&self, table: &str, rows: &[Record]) -> Result<(), StoreError>;

    /// Plain insert of `rows`; fails on key conflicts
    async fn insert(&self, table: &str, rows: &[Record]) -> Result<(), StoreError>;
}
