//! In-process store
//!
//! Keeps rows per table in memory and mirrors the write semantics of the
//! remote store: upsert merges into an existing row keyed on `key`, insert
//! rejects a key that is already present. Faults can be injected per key
//! (selects) or per table (writes).

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{KeyFilter, RecordStore, Row, StoreError};
use crate::record::{Record, KEY_FIELD};

#[derive(Debug, Default)]
struct TableData {
    keyed: BTreeMap<String, Row>,
    keyless: Vec<Row>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, TableData>,
    poisoned_keys: HashSet<String>,
    failing_tables: HashSet<String>,
    select_calls: usize,
    write_batches: HashMap<String, Vec<usize>>,
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put rows into `table` directly, bypassing fault injection and counters
    pub fn seed<I>(&self, table: &str, rows: I)
    where
        I: IntoIterator<Item = Row>,
    {
        let mut state = self.state();
        let data = state.tables.entry(table.to_string()).or_default();
        for row in rows {
            match row_key(&row) {
                Some(key) => {
                    data.keyed.insert(key, row);
                },
                None => data.keyless.push(row),
            }
        }
    }

    /// Any select whose filter names `key` fails
    pub fn poison_key(&self, key: impl Into<String>) {
        self.state().poisoned_keys.insert(key.into());
    }

    /// Every write to `table` fails
    pub fn fail_writes_to(&self, table: impl Into<String>) {
        self.state().failing_tables.insert(table.into());
    }

    /// All rows of `table`, keyed rows first in key order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state();
        state
            .tables
            .get(table)
            .map(|data| data.keyed.values().chain(&data.keyless).cloned().collect())
            .unwrap_or_default()
    }

    pub fn row(&self, table: &str, key: &str) -> Option<Row> {
        self.state()
            .tables
            .get(table)
            .and_then(|data| data.keyed.get(key).cloned())
    }

    /// Number of select calls served, failed ones included
    pub fn select_calls(&self) -> usize {
        self.state().select_calls
    }

    /// Sizes of the write batches accepted for `table`, in order
    pub fn write_batches(&self, table: &str) -> Vec<usize> {
        self.state()
            .write_batches
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn write(&self, table: &str, rows: &[Record], merge: bool) -> Result<(), StoreError> {
        let rows = rows
            .iter()
            .map(to_row)
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut state = self.state();
        if state.failing_tables.contains(table) {
            return Err(StoreError::rejected(format!("writes to '{table}' are failing")));
        }

        let data = state.tables.entry(table.to_string()).or_default();
        if !merge {
            if let Some(key) = rows
                .iter()
                .filter_map(row_key)
                .find(|key| data.keyed.contains_key(key))
            {
                return Err(StoreError::Status {
                    status: 409,
                    message: format!("duplicate key value '{key}'"),
                });
            }
        }

        let count = rows.len();
        for row in rows {
            match row_key(&row) {
                Some(key) => {
                    let stored = data.keyed.entry(key).or_default();
                    stored.extend(row);
                },
                None => data.keyless.push(row),
            }
        }

        state
            .write_batches
            .entry(table.to_string())
            .or_default()
            .push(count);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filter: &KeyFilter,
    ) -> Result<Vec<Row>, StoreError> {
        let mut state = self.state();
        state.select_calls += 1;

        if let Some(key) = filter
            .keys()
            .iter()
            .find(|key| state.poisoned_keys.contains(*key))
        {
            return Err(StoreError::rejected(format!("lookup of '{key}' failed")));
        }

        let Some(data) = state.tables.get(table) else {
            return Ok(Vec::new());
        };

        Ok(filter
            .keys()
            .iter()
            .filter_map(|key| data.keyed.get(key))
            .map(|row| {
                columns
                    .iter()
                    .filter_map(|column| {
                        row.get(*column)
                            .map(|value| (column.to_string(), value.clone()))
                    })
                    .collect()
            })
            .collect())
    }

    async fn upsert(&self, table: &str, rows: &[Record]) -> Result<(), StoreError> {
        self.write(table, rows, true)
    }

    async fn insert(&self, table: &str, rows: &[Record]) -> Result<(), StoreError> {
        self.write(table, rows, false)
    }
}

fn to_row(record: &Record) -> Result<Row, StoreError> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(StoreError::rejected(format!("record is not an object: {other}"))),
    }
}

fn row_key(row: &Row) -> Option<String> {
    row.get(KEY_FIELD)
        .and_then(serde_json::Value::as_str)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}
