//! CSV signal tables.
//!
//! Two tables share one layout: the append-only signal log and the
//! open-trades table the monitor rewrites every pass. Columns are
//! `Stock, Price, Strategy, SL, Target1, Target2, Target3, Date`.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{OpenTrade, Signal};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One CSV table of signal rows.
#[derive(Debug, Clone)]
pub struct SignalTable {
    path: PathBuf,
}

impl SignalTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    /// All rows in file order. A missing table reads as empty.
    pub fn load(&self) -> Result<Vec<Signal>, StoreError> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(e) => {
                let missing = matches!(
                    e.kind(),
                    csv::ErrorKind::Io(inner) if inner.kind() == io::ErrorKind::NotFound
                );
                if missing {
                    return Ok(Vec::new());
                }
                return Err(self.csv_err(e));
            }
        };
        reader
            .deserialize()
            .collect::<Result<Vec<Signal>, _>>()
            .map_err(|e| self.csv_err(e))
    }

    pub fn load_trades(&self) -> Result<Vec<OpenTrade>, StoreError> {
        Ok(self.load()?.into_iter().map(OpenTrade::from).collect())
    }

    /// Append rows, writing the header only when the file is new or empty.
    pub fn append(&self, rows: &[Signal]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(self.io_err(e)),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for row in rows {
            writer.serialize(row).map_err(|e| self.csv_err(e))?;
        }
        writer.flush().map_err(|e| self.io_err(e))
    }

    /// Replace the table with exactly `rows`.
    ///
    /// Written to a sibling temp file and renamed over the original, so a
    /// crash mid-write leaves the previous table intact. An empty `rows`
    /// still leaves a header-only table.
    pub fn rewrite(&self, rows: &[Signal]) -> Result<(), StoreError> {
        let tmp = self.temp_path();
        let result = self.write_all(&tmp, rows).and_then(|()| {
            fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    pub fn rewrite_trades(&self, trades: &[OpenTrade]) -> Result<(), StoreError> {
        let rows: Vec<Signal> = trades.iter().map(|t| t.signal().clone()).collect();
        self.rewrite(&rows)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "table.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_all(&self, path: &Path, rows: &[Signal]) -> Result<(), StoreError> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| self.csv_err(e))?;
        if rows.is_empty() {
            writer
                .write_record(HEADER)
                .map_err(|e| self.csv_err(e))?;
        }
        for row in rows {
            writer.serialize(row).map_err(|e| self.csv_err(e))?;
        }
        writer.flush().map_err(|e| self.io_err(e))
    }
}

pub const HEADER: [&str; 8] = [
    "Stock", "Price", "Strategy", "SL", "Target1", "Target2", "Target3", "Date",
];
