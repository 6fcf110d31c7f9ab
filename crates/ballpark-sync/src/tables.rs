//! Table catalog
//!
//! A [`TableSpec`] names a store table, the snapshot file that feeds it, and
//! which columns are integers or reals. The [`TableCatalog`] keeps specs in
//! processing order: master/reference tables first, transaction tables after,
//! so reference-data failures show up first in the logs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::coerce::ColumnKind;
use crate::error::{Result, SyncError};
use crate::record::KEY_FIELD;

/// Static configuration for one store table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Store table name
    pub name: String,

    /// Snapshot file for this table
    pub source: PathBuf,

    /// Columns coerced to integers
    #[serde(default)]
    pub integer_columns: BTreeSet<String>,

    /// Columns coerced to reals
    #[serde(default)]
    pub numeric_columns: BTreeSet<String>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            integer_columns: BTreeSet::new(),
            numeric_columns: BTreeSet::new(),
        }
    }

    pub fn with_integer_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.integer_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_numeric_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Classification of a header column; undeclared columns are plain text
    pub fn column_kind(&self, column: &str) -> ColumnKind {
        if self.integer_columns.contains(column) {
            ColumnKind::Integer
        } else if self.numeric_columns.contains(column) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Plain
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SyncError::catalog("table name cannot be empty"));
        }

        if let Some(column) = self.integer_columns.intersection(&self.numeric_columns).next() {
            return Err(SyncError::catalog(format!(
                "column '{}' of '{}' is declared both integer and numeric",
                column, self.name
            )));
        }

        if self.column_kind(KEY_FIELD) != ColumnKind::Plain {
            return Err(SyncError::catalog(format!(
                "'{}' of '{}' must stay a plain text column",
                KEY_FIELD, self.name
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tables: Vec<TableSpec>,
}

/// Ordered list of tables to sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCatalog {
    tables: Vec<TableSpec>,
}

impl TableCatalog {
    /// Build a catalog, validating every spec and rejecting duplicate names
    pub fn new(tables: Vec<TableSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for table in &tables {
            table.validate()?;
            if !seen.insert(table.name.as_str()) {
                return Err(SyncError::catalog(format!(
                    "table '{}' is listed more than once",
                    table.name
                )));
            }
        }

        Ok(Self { tables })
    }

    /// Parse a TOML catalog; relative sources resolve against `base_dir`
    ///
    /// ```toml
    /// [[tables]]
    /// name = "transaction_team_stats"
    /// source = "output/04_team_stats.csv"
    /// integer_columns = ["year", "games"]
    /// numeric_columns = ["batting_average"]
    /// ```
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| SyncError::catalog(e.to_string()))?;

        let tables = file
            .tables
            .into_iter()
            .map(|mut table| {
                if table.source.is_relative() {
                    table.source = base_dir.join(&table.source);
                }
                table
            })
            .collect();

        Self::new(tables)
    }

    /// Load a TOML catalog from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::catalog(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        Self::from_toml_str(&content, base_dir)
    }

    /// Built-in catalog for the scraped baseball snapshots
    ///
    /// Master tables come from `input_dir`, transaction tables from
    /// `output_dir`. Column names match the scraper headers verbatim.
    pub fn builtin(input_dir: &Path, output_dir: &Path) -> Self {
        let tables = vec![
            TableSpec::new("master_teams_info", input_dir.join("00_teams_info.csv")),
            TableSpec::new("master_players_info", input_dir.join("01_players_info.csv"))
                .with_integer_columns(["player_number"]),
            TableSpec::new("transaction_game_info", output_dir.join("01_game_info.csv"))
                .with_integer_columns(
                    ["top_team_score", "bottom_team_score"]
                        .into_iter()
                        .map(String::from)
                        .chain((1..=9).map(|i| format!("top_inning_score_{i}")))
                        .chain((1..=9).map(|i| format!("bottom_inning_score_{i}"))),
                ),
            TableSpec::new(
                "transaction_game_hitter_stats",
                output_dir.join("02_game_hitter_stats.csv"),
            )
            .with_integer_columns([
                "player_number",
                "order",
                "plate_apperance",
                "at_bat",
                "hit",
                "hr",
                "rbi",
                "run",
                "stolen_base",
                "double",
                "triple",
                "at_bat_in_scoring",
                "hit_in_scoring",
                "strikeout",
                "walk",
                "hit_by_pitch",
                "sacrifice_bunt",
                "sacrifice_fly",
                "double_play",
                "oponent_error",
                "own_error",
                "caught_stealing",
            ]),
            TableSpec::new(
                "transaction_game_pitcher_stats",
                output_dir.join("03_game_pitcher_stats.csv"),
            )
            .with_integer_columns([
                "player_number",
                "pitches",
                "runs_allowed",
                "earned_runs",
                "hits_allowed",
                "hr_allowed",
                "strikeouts",
                "walks_allowed",
                "hit_batsmen",
                "balks",
                "wild_pitches",
                "order",
            ]),
            TableSpec::new("transaction_team_stats", output_dir.join("04_team_stats.csv"))
                .with_integer_columns([
                    "year",
                    "games",
                    "wins",
                    "losses",
                    "draws",
                    "runs_scored",
                    "runs_allowed",
                    "home_runs",
                    "stolen_bases",
                ])
                .with_numeric_columns([
                    "winning_percentage",
                    "batting_average",
                    "earned_run_average",
                ]),
            TableSpec::new("transaction_hitter_stats", output_dir.join("05_hitter_stats.csv"))
                .with_integer_columns([
                    "year",
                    "player_number",
                    "games_played",
                    "plate_appearance",
                    "at_bats",
                    "hit",
                    "hr",
                    "rbi",
                    "run",
                    "stolen_base",
                    "double",
                    "triple",
                    "total_bases",
                    "strikeout",
                    "walk",
                    "hit_by_pitch",
                    "sacrifice_bunt",
                    "sacrifice_fly",
                    "double_play",
                    "opponent_error",
                    "own_error",
                    "caught_stealing",
                ])
                .with_numeric_columns([
                    "batting_average",
                    "on_base_percentage",
                    "slugging_percentage",
                    "average_in_scoring",
                    "ops",
                ]),
            TableSpec::new("transaction_pitcher_stats", output_dir.join("06_pitcher_stats.csv"))
                .with_integer_columns([
                    "year",
                    "player_number",
                    "games_played",
                    "wins",
                    "holds",
                    "saves",
                    "losses",
                    "pitches_thrown",
                    "runs_allowed",
                    "earned_runs_allowed",
                    "complete_games",
                    "shutouts",
                    "hits_allowed",
                    "home_runs_allowed",
                    "strikeouts",
                    "walks_allowed",
                    "hit_batters",
                    "balks",
                    "wild_pitches",
                ])
                .with_numeric_columns(["win_percentage", "era", "strikeout_rate", "k_bb", "whip"]),
        ];

        Self { tables }
    }

    /// Restrict the catalog to the named tables, keeping catalog order
    pub fn select(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }

        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(SyncError::config(format!("unknown table '{unknown}'")));
        }

        let tables = self
            .tables
            .into_iter()
            .filter(|table| names.contains(&table.name))
            .collect();

        Ok(Self { tables })
    }

    pub fn get(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_puts_master_tables_first() {
        let catalog = TableCatalog::builtin(Path::new("input"), Path::new("output"));
        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "master_teams_info");
        assert_eq!(names[1], "master_players_info");
        assert!(names[2..].iter().all(|n| n.starts_with("transaction_")));
        assert_eq!(catalog.tables()[0].source, Path::new("input/00_teams_info.csv"));
        assert_eq!(catalog.tables()[7].source, Path::new("output/06_pitcher_stats.csv"));
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = TableCatalog::builtin(Path::new("in"), Path::new("out"));
        TableCatalog::new(catalog.tables().to_vec()).unwrap();

        let game_info = catalog.get("transaction_game_info").unwrap();
        assert_eq!(game_info.integer_columns.len(), 20);
        assert!(game_info.integer_columns.contains("bottom_inning_score_9"));
    }

    #[test]
    fn test_column_kind() {
        let spec = catalog_spec();
        assert_eq!(spec.column_kind("year"), ColumnKind::Integer);
        assert_eq!(spec.column_kind("era"), ColumnKind::Numeric);
        assert_eq!(spec.column_kind("team"), ColumnKind::Plain);
        assert_eq!(spec.column_kind(KEY_FIELD), ColumnKind::Plain);
    }

    #[test]
    fn test_validate_rejects_overlapping_kinds() {
        let spec = TableSpec::new("t", "t.csv")
            .with_integer_columns(["wins"])
            .with_numeric_columns(["wins"]);
        assert!(matches!(spec.validate(), Err(SyncError::Catalog(_))));
    }

    #[test]
    fn test_validate_rejects_typed_key() {
        let spec = TableSpec::new("t", "t.csv").with_integer_columns([KEY_FIELD]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_new_rejects_duplicates_and_blank_names() {
        let dup = TableCatalog::new(vec![TableSpec::new("a", "a.csv"), TableSpec::new("a", "b.csv")]);
        assert!(matches!(dup, Err(SyncError::Catalog(_))));

        let blank = TableCatalog::new(vec![TableSpec::new("  ", "a.csv")]);
        assert!(blank.is_err());
    }

    #[test]
    fn test_from_toml_resolves_relative_sources() {
        let toml = r#"
            [[tables]]
            name = "master_teams_info"
            source = "input/00_teams_info.csv"

            [[tables]]
            name = "transaction_pitcher_stats"
            source = "/data/06_pitcher_stats.csv"
            integer_columns = ["year", "wins"]
            numeric_columns = ["era"]
        "#;

        let catalog = TableCatalog::from_toml_str(toml, Path::new("/srv/ballpark")).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.tables()[0].source,
            Path::new("/srv/ballpark/input/00_teams_info.csv")
        );
        assert_eq!(catalog.tables()[1].source, Path::new("/data/06_pitcher_stats.csv"));
        assert_eq!(catalog.tables()[1].column_kind("era"), ColumnKind::Numeric);
    }

    #[test]
    fn test_from_toml_rejects_malformed() {
        let err = TableCatalog::from_toml_str("[[tables]]\nsource = 3", Path::new(".")).unwrap_err();
        assert!(matches!(err, SyncError::Catalog(_)));
    }

    #[test]
    fn test_select_keeps_catalog_order() {
        let catalog = TableCatalog::builtin(Path::new("in"), Path::new("out"));
        let selected = catalog
            .select(&["transaction_team_stats".to_string(), "master_teams_info".to_string()])
            .unwrap();

        let names: Vec<&str> = selected.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["master_teams_info", "transaction_team_stats"]);
    }

    #[test]
    fn test_select_unknown_table() {
        let catalog = TableCatalog::builtin(Path::new("in"), Path::new("out"));
        let err = catalog.select(&["box_scores".to_string()]).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    fn catalog_spec() -> TableSpec {
        TableSpec::new("transaction_pitcher_stats", "p.csv")
            .with_integer_columns(["year"])
            .with_numeric_columns(["era"])
    }
}
