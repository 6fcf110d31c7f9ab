//! Snapshot records
//!
//! A [`Record`] is one snapshot row after coercion: the header columns of its
//! table mapped to typed values, plus the three store-managed lifecycle fields
//! once [`Record::stamp`] has run. Records live for a single run only.

use ballpark_common::{Timestamp, Value};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::coerce::coerce;
use crate::tables::TableSpec;

/// Business key column, unique per table
pub const KEY_FIELD: &str = "key";

/// Soft-delete flag; always written as `0`
pub const DELETE_FLAG_FIELD: &str = "delete_flg";

/// Set on first write, never overwritten afterwards
pub const CREATED_FIELD: &str = "created_dt";

/// Refreshed on every write
pub const UPDATED_FIELD: &str = "updated_dt";

/// One row bound for the store
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a snapshot row.
    ///
    /// Cells are matched to `header` by position and coerced with the kind the
    /// table declares for that column name. Missing trailing cells are null and
    /// cells past the header width are dropped.
    pub fn from_row<'a, I>(spec: &TableSpec, header: &[String], cells: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut cells = cells.into_iter();
        let fields = header
            .iter()
            .map(|column| {
                let raw = cells.next().unwrap_or("");
                (column.clone(), coerce(raw, spec.column_kind(column)))
            })
            .collect();

        Self { fields }
    }

    /// Non-empty business key, if the row has one
    pub fn key(&self) -> Option<&str> {
        self.fields
            .get(KEY_FIELD)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set the lifecycle fields for a write.
    ///
    /// `created` is usually a timestamp but may be whatever the store already
    /// holds for the row, null included.
    pub fn stamp(&mut self, created: impl Into<Value>, updated: Timestamp) {
        self.insert(DELETE_FLAG_FIELD, 0i64);
        self.insert(CREATED_FIELD, created);
        self.insert(UPDATED_FIELD, updated);
    }

    pub fn created_dt(&self) -> Option<&Timestamp> {
        self.get(CREATED_FIELD).and_then(Value::as_timestamp)
    }

    pub fn updated_dt(&self) -> Option<&Timestamp> {
        self.get(UPDATED_FIELD).and_then(Value::as_timestamp)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
