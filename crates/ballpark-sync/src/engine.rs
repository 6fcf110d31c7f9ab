//! Reconciliation engine
//!
//! Stamps lifecycle fields on a table's records and writes them in bounded
//! batches. In [`SyncMode::Upsert`] each batch's keys are resolved first so
//! that existing rows keep their `created_dt`; in [`SyncMode::InsertOnly`]
//! every record is new.
//!
//! Batches run strictly in order and a failed write stops the table: batches
//! written before it stay committed.

use ballpark_common::{Timestamp, Value};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::BatchConfig;
use crate::error::{Result, SyncError};
use crate::record::Record;
use crate::resolver::{ExistenceResolver, Lookup};
use crate::store::RecordStore;
use crate::tables::TableSpec;

/// How records reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Plain inserts, no existence lookups; for bootstrapping empty tables
    InsertOnly,
    /// Resolve existing keys, then insert-or-replace keyed on `key`
    #[default]
    Upsert,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::InsertOnly => write!(f, "insert-only"),
            SyncMode::Upsert => write!(f, "upsert"),
        }
    }
}

/// Counters for one reconciled table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub processed: usize,
    pub updated: usize,
    pub inserted: usize,
    /// Keys whose lookup kept failing; also counted in `inserted`
    pub unresolved: usize,
    pub batches: usize,
}

impl ReconcileStats {
    pub fn merge(&mut self, other: &ReconcileStats) {
        self.processed += other.processed;
        self.updated += other.updated;
        self.inserted += other.inserted;
        self.unresolved += other.unresolved;
        self.batches += other.batches;
    }
}

pub struct ReconciliationEngine {
    store: Arc<dyn RecordStore>,
    resolver: ExistenceResolver,
    write_batch_size: usize,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn RecordStore>, batch: BatchConfig) -> Self {
        Self {
            resolver: ExistenceResolver::new(store.clone(), batch.lookup_batch_size),
            store,
            write_batch_size: batch.write_batch_size.max(1),
        }
    }

    /// Stamp and write `records` to `spec.name`.
    ///
    /// `now` becomes `updated_dt` for every record and `created_dt` for new
    /// ones. On a write failure the returned [`SyncError::Write`] names the
    /// failing batch and how many records were committed before it.
    #[instrument(
        skip_all,
        fields(table = %spec.name, records = records.len(), mode = %mode)
    )]
    pub async fn reconcile(
        &self,
        spec: &TableSpec,
        records: &mut [Record],
        mode: SyncMode,
        now: Timestamp,
    ) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        for (index, batch) in records.chunks_mut(self.write_batch_size).enumerate() {
            let batch_stats = match mode {
                SyncMode::Upsert => self.stamp_upsert_batch(spec, batch, now).await,
                SyncMode::InsertOnly => stamp_new(batch, now),
            };

            let written = match mode {
                SyncMode::Upsert => self.store.upsert(&spec.name, batch).await,
                SyncMode::InsertOnly => self.store.insert(&spec.name, batch).await,
            };

            if let Err(e) = written {
                return Err(SyncError::write(&spec.name, index, stats.processed, e));
            }

            stats.merge(&batch_stats);
            debug!(
                batch = index,
                size = batch.len(),
                updated = batch_stats.updated,
                inserted = batch_stats.inserted,
                "Batch written"
            );
        }

        Ok(stats)
    }

    async fn stamp_upsert_batch(
        &self,
        spec: &TableSpec,
        batch: &mut [Record],
        now: Timestamp,
    ) -> ReconcileStats {
        let resolution = self
            .resolver
            .resolve(&spec.name, batch.iter().filter_map(Record::key))
            .await;

        let mut stats = ReconcileStats {
            processed: batch.len(),
            unresolved: resolution.unresolved_len(),
            batches: 1,
            ..Default::default()
        };

        for record in batch.iter_mut() {
            // Unresolved keys are written as new, same as missing ones
            let created = match record.key().map(|key| resolution.lookup(key)) {
                Some(Lookup::Found(existing)) => {
                    stats.updated += 1;
                    existing.created_dt.clone()
                },
                Some(Lookup::NotFound | Lookup::Unresolved) | None => {
                    stats.inserted += 1;
                    Value::from(now)
                },
            };
            record.stamp(created, now);
        }

        stats
    }
}

fn stamp_new(batch: &mut [Record], now: Timestamp) -> ReconcileStats {
    for record in batch.iter_mut() {
        record.stamp(now, now);
    }

    ReconcileStats {
        processed: batch.len(),
        inserted: batch.len(),
        batches: 1,
        ..Default::default()
    }
}
