//! End-to-end sync runs against the in-memory store
//!
//! Snapshots and the TOML catalog live in a temporary directory; the store
//! is a `MemoryStore` so failures can be injected per key or per table.

use ballpark_common::Timestamp;
use ballpark_sync::config::BatchConfig;
use ballpark_sync::driver::SkipReason;
use ballpark_sync::store::MemoryStore;
use ballpark_sync::{Driver, RunPolicy, SyncMode, TableCatalog, TableStatus};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

const CATALOG: &str = r#"
[[tables]]
name = "master_teams_info"
source = "input/00_teams_info.csv"

[[tables]]
name = "transaction_game_info"
source = "output/01_game_info.csv"
integer_columns = ["top_team_score", "bottom_team_score"]

[[tables]]
name = "transaction_hitter_stats"
source = "output/05_hitter_stats.csv"
integer_columns = ["year", "hr"]
numeric_columns = ["ops"]
"#;

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Catalog file plus teams and hitter snapshots; game info is left missing
fn workspace() -> (tempfile::TempDir, TableCatalog) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "tables.toml", CATALOG);
    write(
        dir.path(),
        "input/00_teams_info.csv",
        "\u{feff}key,team_name,stadium\norcas,Orcas,-\nhawks,Hawks,Bay Dome\n",
    );
    write(
        dir.path(),
        "output/05_hitter_stats.csv",
        "key,year,name,hr,ops\norcas_2024_7,2024,Sato,12,.845\norcas_2024_8,2024,Ito,-,.\n",
    );

    let catalog = TableCatalog::load(&dir.path().join("tables.toml")).unwrap();
    (dir, catalog)
}

fn driver(store: &Arc<MemoryStore>, mode: SyncMode, now: Timestamp) -> Driver {
    Driver::new(store.clone(), BatchConfig::default(), RunPolicy::for_mode(mode)).with_clock(move || now)
}

#[tokio::test]
async fn test_catalog_order_and_missing_source() {
    let (_dir, catalog) = workspace();
    let store = Arc::new(MemoryStore::new());

    let report = driver(&store, SyncMode::Upsert, t0()).run(&catalog).await;

    let names: Vec<&str> = report.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(
        names,
        vec!["master_teams_info", "transaction_game_info", "transaction_hitter_stats"]
    );
    assert_eq!(
        report.tables[1].status,
        TableStatus::Skipped {
            reason: SkipReason::MissingSource
        }
    );
    assert!(matches!(report.tables[2].status, TableStatus::Synced { .. }));
    assert_eq!(report.exit_code(), 0);

    // Plain "-" stays text, numeric "-" and "." become null
    let team = store.row("master_teams_info", "orcas").unwrap();
    assert_eq!(team["stadium"], json!("-"));
    let hitter = store.row("transaction_hitter_stats", "orcas_2024_8").unwrap();
    assert_eq!(hitter["hr"], json!(null));
    assert_eq!(hitter["ops"], json!(null));
    let hitter = store.row("transaction_hitter_stats", "orcas_2024_7").unwrap();
    assert_eq!(hitter["ops"], json!(0.845));
}

#[tokio::test]
async fn test_second_run_is_all_updates_and_keeps_created_dt() {
    let (_dir, catalog) = workspace();
    let store = Arc::new(MemoryStore::new());
    let t1 = t0() + Duration::days(1);

    let first = driver(&store, SyncMode::Upsert, t0()).run(&catalog).await;
    assert_eq!(first.totals().inserted, 4);
    assert_eq!(first.totals().updated, 0);

    let second = driver(&store, SyncMode::Upsert, t1).run(&catalog).await;
    assert_eq!(second.totals().updated, 4);
    assert_eq!(second.totals().inserted, 0);

    for key in ["orcas", "hawks"] {
        let row = store.row("master_teams_info", key).unwrap();
        assert_eq!(row["created_dt"], json!("2024-04-01T09:00:00.000000+00:00"));
        assert_eq!(row["updated_dt"], json!("2024-04-02T09:00:00.000000+00:00"));
        assert_eq!(row["delete_flg"], json!(0));
    }
}

#[tokio::test]
async fn test_unresolved_key_is_reported_without_failing_run() {
    let (_dir, catalog) = workspace();
    let store = Arc::new(MemoryStore::new());
    store.poison_key("hawks");

    let report = driver(&store, SyncMode::Upsert, t0()).run(&catalog).await;

    match &report.tables[0].status {
        TableStatus::Synced { stats } => {
            assert_eq!(stats.unresolved, 1);
            assert_eq!(stats.inserted, 2);
        },
        other => panic!("expected synced table, got {other:?}"),
    }
    assert!(store.row("master_teams_info", "hawks").is_some());
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_501_records_make_two_batches() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = String::from("key,hr\n");
    for i in 0..501 {
        writeln!(csv, "k{i},{i}").unwrap();
    }
    write(dir.path(), "big.csv", &csv);
    write(
        dir.path(),
        "tables.toml",
        "[[tables]]\nname = \"big\"\nsource = \"big.csv\"\ninteger_columns = [\"hr\"]\n",
    );
    let catalog = TableCatalog::load(&dir.path().join("tables.toml")).unwrap();
    let store = Arc::new(MemoryStore::new());

    let report = driver(&store, SyncMode::Upsert, t0()).run(&catalog).await;

    assert_eq!(store.write_batches("big"), vec![500, 1]);
    assert_eq!(store.rows("big").len(), 501);
    match &report.tables[0].status {
        TableStatus::Synced { stats } => assert_eq!(stats.batches, 2),
        other => panic!("expected synced table, got {other:?}"),
    }
}

#[tokio::test]
async fn test_write_failure_policy_by_mode() {
    let (_dir, catalog) = workspace();

    let store = Arc::new(MemoryStore::new());
    store.fail_writes_to("master_teams_info");
    let upsert = driver(&store, SyncMode::Upsert, t0()).run(&catalog).await;
    assert!(upsert.tables[0].status.is_failed());
    assert!(matches!(upsert.tables[2].status, TableStatus::Synced { .. }));
    assert_eq!(upsert.error_count(), 1);
    assert_eq!(upsert.exit_code(), 1);

    let store = Arc::new(MemoryStore::new());
    store.fail_writes_to("master_teams_info");
    let load = driver(&store, SyncMode::InsertOnly, t0()).run(&catalog).await;
    assert!(load.aborted);
    assert_eq!(load.tables[1].status, TableStatus::NotAttempted);
    assert_eq!(load.tables[2].status, TableStatus::NotAttempted);
    assert!(store.rows("transaction_hitter_stats").is_empty());
    assert_eq!(load.exit_code(), 1);
}
