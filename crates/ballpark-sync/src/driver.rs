//! Sync driver
//!
//! Walks the table catalog in order, reads each snapshot and hands its
//! records to the [`ReconciliationEngine`]. What happens after a table fails
//! is decided by the [`RunPolicy`], so both modes share one loop.

use ballpark_common::Timestamp;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::BatchConfig;
use crate::engine::{ReconcileStats, ReconciliationEngine, SyncMode};
use crate::snapshot::read_snapshot;
use crate::store::RecordStore;
use crate::tables::{TableCatalog, TableSpec};

/// What to do once a table fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteErrorPolicy {
    /// Stop; remaining tables are not attempted
    Abort,
    /// Record the failure and move on to the next table
    ContinueAndReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    pub mode: SyncMode,
    pub on_table_error: WriteErrorPolicy,
}

impl RunPolicy {
    /// Insert-only runs abort on the first failure, upsert runs continue
    pub fn for_mode(mode: SyncMode) -> Self {
        let on_table_error = match mode {
            SyncMode::InsertOnly => WriteErrorPolicy::Abort,
            SyncMode::Upsert => WriteErrorPolicy::ContinueAndReport,
        };

        Self {
            mode,
            on_table_error,
        }
    }
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self::for_mode(SyncMode::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingSource,
    EmptySource,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingSource => write!(f, "missing source"),
            SkipReason::EmptySource => write!(f, "empty source"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Synced { stats: ReconcileStats },
    Skipped { reason: SkipReason },
    Failed { error: String },
    /// An earlier failure aborted the run
    NotAttempted,
}

impl TableStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TableStatus::Failed { .. })
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableStatus::Synced { stats } => write!(
                f,
                "synced (processed {}, updated {}, inserted {}, unresolved {})",
                stats.processed, stats.updated, stats.inserted, stats.unresolved
            ),
            TableStatus::Skipped { reason } => write!(f, "skipped ({reason})"),
            TableStatus::Failed { error } => write!(f, "failed: {error}"),
            TableStatus::NotAttempted => write!(f, "not attempted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub source: PathBuf,
    #[serde(flatten)]
    pub status: TableStatus,
}

/// Outcome of one run, one entry per catalog table in catalog order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: SyncMode,
    pub started_at: Timestamp,
    pub tables: Vec<TableOutcome>,
    pub aborted: bool,
}

impl RunReport {
    /// Sum of the counters of every synced table
    pub fn totals(&self) -> ReconcileStats {
        let mut totals = ReconcileStats::default();
        for outcome in &self.tables {
            if let TableStatus::Synced { stats } = &outcome.status {
                totals.merge(stats);
            }
        }
        totals
    }

    pub fn error_count(&self) -> usize {
        self.tables.iter().filter(|t| t.status.is_failed()).count()
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn is_success(&self) -> bool {
        self.error_count() == 0
    }

    /// Process exit status: 0 when no table failed, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sync run {} ({})", self.run_id, self.mode)?;

        let width = self.tables.iter().map(|t| t.table.len()).max().unwrap_or(0);
        for outcome in &self.tables {
            writeln!(f, "  {:<width$}  {}", outcome.table, outcome.status)?;
        }

        let totals = self.totals();
        write!(
            f,
            "Total: updated {}, inserted {}, unresolved {}, errors {}",
            totals.updated,
            totals.inserted,
            totals.unresolved,
            self.error_count()
        )?;

        if self.aborted {
            write!(f, " (run aborted)")?;
        }

        Ok(())
    }
}

type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Runs a catalog against a store
pub struct Driver {
    engine: ReconciliationEngine,
    policy: RunPolicy,
    clock: Clock,
}

impl Driver {
    pub fn new(store: Arc<dyn RecordStore>, batch: BatchConfig, policy: RunPolicy) -> Self {
        Self {
            engine: ReconciliationEngine::new(store, batch),
            policy,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for the run timestamp
    pub fn with_clock(mut self, clock: impl Fn() -> Timestamp + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Process every table of `catalog` in order.
    ///
    /// Never fails: table-level problems land in the report.
    pub async fn run(&self, catalog: &TableCatalog) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", %run_id, mode = %self.policy.mode);

        self.run_tables(run_id, catalog).instrument(span).await
    }

    async fn run_tables(&self, run_id: Uuid, catalog: &TableCatalog) -> RunReport {
        let started_at = (self.clock)();
        info!(tables = catalog.len(), "Starting sync run");

        let mut report = RunReport {
            run_id,
            mode: self.policy.mode,
            started_at,
            tables: Vec::with_capacity(catalog.len()),
            aborted: false,
        };

        for spec in catalog.iter() {
            let status = if report.aborted {
                TableStatus::NotAttempted
            } else {
                let span = info_span!("table", table = %spec.name);
                self.sync_table(spec, started_at).instrument(span).await
            };

            if status.is_failed() && self.policy.on_table_error == WriteErrorPolicy::Abort {
                error!(table = %spec.name, "Aborting run; remaining tables are not attempted");
                report.aborted = true;
            }

            report.tables.push(TableOutcome {
                table: spec.name.clone(),
                source: spec.source.clone(),
                status,
            });
        }

        let totals = report.totals();
        info!(
            updated = totals.updated,
            inserted = totals.inserted,
            unresolved = totals.unresolved,
            errors = report.error_count(),
            aborted = report.aborted,
            "Sync run finished"
        );

        report
    }

    async fn sync_table(&self, spec: &TableSpec, now: Timestamp) -> TableStatus {
        let mut records = match read_snapshot(spec) {
            Ok(Some(records)) if records.is_empty() => {
                warn!(path = %spec.source.display(), "Skipped: snapshot has no records");
                return TableStatus::Skipped {
                    reason: SkipReason::EmptySource,
                };
            },
            Ok(Some(records)) => records,
            Ok(None) => {
                warn!(path = %spec.source.display(), "Skipped: snapshot not found");
                return TableStatus::Skipped {
                    reason: SkipReason::MissingSource,
                };
            },
            Err(e) => {
                error!(error = %e, "Failed to read snapshot");
                return TableStatus::Failed {
                    error: e.to_string(),
                };
            },
        };

        match self
            .engine
            .reconcile(spec, &mut records, self.policy.mode, now)
            .await
        {
            Ok(stats) => {
                info!(
                    processed = stats.processed,
                    updated = stats.updated,
                    inserted = stats.inserted,
                    unresolved = stats.unresolved,
                    "Table synced"
                );
                if stats.unresolved > 0 {
                    warn!(
                        unresolved = stats.unresolved,
                        "Unresolved keys were written as new; their created_dt may have been reset"
                    );
                }
                TableStatus::Synced { stats }
            },
            Err(e) => {
                error!(error = %e, "Table sync failed");
                TableStatus::Failed {
                    error: e.to_string(),
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::path::Path;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn driver(store: &Arc<MemoryStore>, mode: SyncMode) -> Driver {
        Driver::new(store.clone(), BatchConfig::default(), RunPolicy::for_mode(mode)).with_clock(t0)
    }

    #[test]
    fn test_policy_for_mode() {
        assert_eq!(
            RunPolicy::for_mode(SyncMode::InsertOnly).on_table_error,
            WriteErrorPolicy::Abort
        );
        assert_eq!(RunPolicy::default().on_table_error, WriteErrorPolicy::ContinueAndReport);
    }

    #[tokio::test]
    async fn test_missing_source_is_skipped_and_others_run() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "key,hr\na1,1\n");
        let c = write(dir.path(), "c.csv", "key,hr\nc1,1\nc2,2\n");
        let catalog = TableCatalog::new(vec![
            TableSpec::new("a", a),
            TableSpec::new("b", dir.path().join("missing.csv")),
            TableSpec::new("c", c),
        ])
        .unwrap();
        let store = Arc::new(MemoryStore::new());

        let report = driver(&store, SyncMode::Upsert).run(&catalog).await;

        let names: Vec<&str> = report.tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            report.outcome("b").unwrap().status,
            TableStatus::Skipped {
                reason: SkipReason::MissingSource
            }
        );
        assert_eq!(report.totals().inserted, 3);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(store.rows("c").len(), 2);
    }

    #[tokio::test]
    async fn test_header_only_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "key,hr\n");
        let catalog = TableCatalog::new(vec![TableSpec::new("a", a)]).unwrap();
        let store = Arc::new(MemoryStore::new());

        let report = driver(&store, SyncMode::Upsert).run(&catalog).await;

        assert_eq!(
            report.tables[0].status,
            TableStatus::Skipped {
                reason: SkipReason::EmptySource
            }
        );
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_upsert_mode_continues_after_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "key\na1\n");
        let b = write(dir.path(), "b.csv", "key\nb1\n");
        let catalog = TableCatalog::new(vec![TableSpec::new("a", a), TableSpec::new("b", b)]).unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_writes_to("a");

        let report = driver(&store, SyncMode::Upsert).run(&catalog).await;

        assert!(report.tables[0].status.is_failed());
        assert!(matches!(report.tables[1].status, TableStatus::Synced { .. }));
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.exit_code(), 1);
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_insert_only_mode_aborts_on_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "key\na1\n");
        let b = write(dir.path(), "b.csv", "key\nb1\n");
        let catalog = TableCatalog::new(vec![TableSpec::new("a", a), TableSpec::new("b", b)]).unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_writes_to("a");

        let report = driver(&store, SyncMode::InsertOnly).run(&catalog).await;

        assert!(report.aborted);
        assert_eq!(report.tables[1].status, TableStatus::NotAttempted);
        assert!(store.rows("b").is_empty());
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_malformed_snapshot_follows_policy() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        std::fs::write(&a, b"key,name\na1,\xff\n").unwrap();
        let b = write(dir.path(), "b.csv", "key\nb1\n");
        let catalog = TableCatalog::new(vec![TableSpec::new("a", a), TableSpec::new("b", b)]).unwrap();
        let store = Arc::new(MemoryStore::new());

        let report = driver(&store, SyncMode::Upsert).run(&catalog).await;

        assert!(report.tables[0].status.is_failed());
        assert!(matches!(report.tables[1].status, TableStatus::Synced { .. }));
    }

    #[tokio::test]
    async fn test_report_display_lists_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "key\na1\n");
        let catalog = TableCatalog::new(vec![
            TableSpec::new("a", a),
            TableSpec::new("b", dir.path().join("missing.csv")),
        ])
        .unwrap();
        let store = Arc::new(MemoryStore::new());

        let report = driver(&store, SyncMode::Upsert).run(&catalog).await;
        let text = report.to_string();

        assert!(text.contains("synced (processed 1, updated 0, inserted 1, unresolved 0)"));
        assert!(text.contains("skipped (missing source)"));
        assert!(text.ends_with("errors 0"));
    }
}
