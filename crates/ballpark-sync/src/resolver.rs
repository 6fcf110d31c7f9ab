//! Existence resolution
//!
//! Finds which keys already exist in a table and when they were created.
//! Lookups go out in bounded `in (...)` batches. A batch whose query fails is
//! split in half and each half retried; a single key that still fails after an
//! equality query is marked [`Lookup::Unresolved`] instead of failing the run.

use ballpark_common::types::parse_timestamp;
use ballpark_common::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::record::{CREATED_FIELD, KEY_FIELD};
use crate::store::{KeyFilter, RecordStore, Row, StoreError};

/// Columns fetched for every lookup
const LOOKUP_COLUMNS: &[&str] = &[KEY_FIELD, CREATED_FIELD];

/// What the store already holds for a key
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingRecordInfo {
    pub key: String,
    /// Stored `created_dt`, written back unchanged. Null when the row has
    /// none, text when the store holds something that is not a timestamp.
    pub created_dt: Value,
}

/// Outcome of looking up one key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a ExistingRecordInfo),
    NotFound,
    /// Every query naming this key failed
    Unresolved,
}

/// Result of resolving a set of keys
#[derive(Debug, Default)]
pub struct Resolution {
    found: HashMap<String, ExistingRecordInfo>,
    unresolved: BTreeSet<String>,
}

impl Resolution {
    pub fn lookup(&self, key: &str) -> Lookup<'_> {
        if let Some(info) = self.found.get(key) {
            Lookup::Found(info)
        } else if self.unresolved.contains(key) {
            Lookup::Unresolved
        } else {
            Lookup::NotFound
        }
    }

    pub fn unresolved(&self) -> &BTreeSet<String> {
        &self.unresolved
    }

    pub fn found_len(&self) -> usize {
        self.found.len()
    }

    pub fn unresolved_len(&self) -> usize {
        self.unresolved.len()
    }
}

/// Looks up existing keys with bounded, bisecting queries
pub struct ExistenceResolver {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
}

impl ExistenceResolver {
    /// A `batch_size` of zero is treated as one
    pub fn new(store: Arc<dyn RecordStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Resolve `keys` against `table`.
    ///
    /// Duplicates and empty keys are dropped first. Never fails: keys whose
    /// lookups keep failing end up in [`Resolution::unresolved`].
    pub async fn resolve<'k, I>(&self, table: &str, keys: I) -> Resolution
    where
        I: IntoIterator<Item = &'k str>,
    {
        let keys = dedup(keys);
        let mut resolution = Resolution::default();

        for chunk in keys.chunks(self.batch_size) {
            self.resolve_batch(table, chunk, &mut resolution).await;
        }

        if !resolution.unresolved.is_empty() {
            warn!(
                table,
                unresolved = resolution.unresolved.len(),
                "Some keys could not be looked up and will be written as new"
            );
        }

        resolution
    }

    async fn resolve_batch(&self, table: &str, batch: &[String], resolution: &mut Resolution) {
        // Left half is always finished before the right half
        let mut pending = vec![batch];

        while let Some(keys) = pending.pop() {
            match self.query(table, KeyFilter::In(keys.to_vec())).await {
                Ok(rows) => resolution.found.extend(rows),
                Err(e) if keys.len() > 1 => {
                    debug!(table, keys = keys.len(), error = %e, "Lookup failed; splitting batch");
                    let (left, right) = keys.split_at(keys.len() / 2);
                    pending.push(right);
                    pending.push(left);
                },
                Err(e) => {
                    let key = &keys[0];
                    match self.query(table, KeyFilter::Eq(key.clone())).await {
                        Ok(rows) => resolution.found.extend(rows),
                        Err(eq_error) => {
                            warn!(
                                table,
                                key = %key,
                                error = %e,
                                retry_error = %eq_error,
                                "Lookup failed for key; treating as new"
                            );
                            resolution.unresolved.insert(key.clone());
                        },
                    }
                },
            }
        }
    }

    async fn query(
        &self,
        table: &str,
        filter: KeyFilter,
    ) -> Result<Vec<(String, ExistingRecordInfo)>, StoreError> {
        let rows = self.store.select(table, LOOKUP_COLUMNS, &filter).await?;

        // A bad row only affects its own key
        Ok(rows
            .iter()
            .filter_map(|row| match decode(row) {
                Some(info) => Some((info.key.clone(), info)),
                None => {
                    debug!(table, row = ?row, "Lookup row has no key; ignoring");
                    None
                },
            })
            .collect())
    }
}

fn dedup<'k, I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'k str>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|key| !key.is_empty() && seen.insert(*key))
        .map(str::to_string)
        .collect()
}

fn decode(row: &Row) -> Option<ExistingRecordInfo> {
    let key = row.get(KEY_FIELD).and_then(serde_json::Value::as_str)?;

    let created_dt = match row.get(CREATED_FIELD) {
        Some(serde_json::Value::String(raw)) => match parse_timestamp(raw) {
            Ok(ts) => Value::Timestamp(ts),
            Err(_) => Value::Text(raw.clone()),
        },
        _ => Value::Null,
    };

    Some(ExistingRecordInfo {
        key: key.to_string(),
        created_dt,
    })
}
