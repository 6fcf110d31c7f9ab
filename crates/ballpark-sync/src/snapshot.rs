//! Snapshot reader
//!
//! Reads one CSV snapshot into [`Record`]s. The first line is the header; cells
//! are bound to columns by header name, so `key` may sit anywhere. A missing
//! file is not an error: it means the scraper has not produced that table yet.

use csv::{ReaderBuilder, StringRecordsIntoIter};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::record::{Record, KEY_FIELD};
use crate::tables::TableSpec;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Streaming reader over one table snapshot. Finite and not restartable.
pub struct SnapshotReader<'a, R: Read = File> {
    spec: &'a TableSpec,
    header: Vec<String>,
    rows: StringRecordsIntoIter<R>,
    path: PathBuf,
}

impl<'a> SnapshotReader<'a, File> {
    /// Open the snapshot named by `spec.source`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn open(spec: &'a TableSpec) -> Result<Option<Self>> {
        match File::open(&spec.source) {
            Ok(file) => Self::from_reader(spec, file).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(table = %spec.name, path = %spec.source.display(), "Snapshot not found");
                Ok(None)
            },
            Err(e) => Err(e.into()),
        }
    }
}

impl<'a, R: Read> SnapshotReader<'a, R> {
    /// Read the header from `reader` and prepare to stream rows
    pub fn from_reader(spec: &'a TableSpec, reader: R) -> Result<Self> {
        let path = spec.source.clone();
        let mut csv = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = csv
            .headers()
            .map_err(|e| SyncError::snapshot(&path, e))?
            .iter()
            .map(clean_header)
            .collect();

        if !header.is_empty() && !header.iter().any(|column| column == KEY_FIELD) {
            warn!(
                table = %spec.name,
                path = %path.display(),
                "Snapshot header has no key column; every row will be written as new"
            );
        }

        Ok(Self {
            spec,
            header,
            rows: csv.into_records(),
            path,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl<R: Read> Iterator for SnapshotReader<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(SyncError::snapshot(&self.path, e))),
            };

            // Structurally empty lines carry no cells
            if row.is_empty() {
                continue;
            }

            return Some(Ok(Record::from_row(self.spec, &self.header, row.iter())));
        }
    }
}

/// Read a whole snapshot into memory.
///
/// `Ok(None)` when the source is missing, `Ok(Some(vec![]))` when it has no
/// data rows.
pub fn read_snapshot(spec: &TableSpec) -> Result<Option<Vec<Record>>> {
    match SnapshotReader::open(spec)? {
        Some(reader) => reader.collect::<Result<Vec<_>>>().map(Some),
        None => Ok(None),
    }
}

fn clean_header(column: &str) -> String {
    column.trim_start_matches(BYTE_ORDER_MARK).trim().to_string()
}
