//! Append-only CSV data log
//!
//! Each accepted record becomes one row:
//! `timestamp, id, author, text, geo_enabled, lon, lat`
//! with the timestamp rendered in the target zone so every row starts with
//! its "YYYY-MM" month.

use crate::record::Record;
use crate::{StorageError, StorageResult};
use chrono::{FixedOffset, SecondsFormat};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The active data log
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
    zone: FixedOffset,
}

impl CsvLog {
    /// Creates a log writing to `path` with timestamps shown in `zone`
    pub fn new(path: impl Into<PathBuf>, zone: FixedOffset) -> Self {
        Self {
            path: path.into(),
            zone,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record as one row
    ///
    /// Re-shared records are skipped. The row is encoded in full first and
    /// then written with a single append, so a terminated process leaves
    /// either the whole row or nothing.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The row was written
    /// * `Ok(false)` - The record was filtered out
    pub fn append(&self, record: &Record) -> StorageResult<bool> {
        if record.is_retweet() {
            tracing::trace!("Skipping re-shared record {}", record.id);
            return Ok(false);
        }

        let row = self.encode_row(record)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.write_all(&row)
            .and_then(|_| file.flush())
            .map_err(|e| StorageError::io(&self.path, e))?;

        Ok(true)
    }

    /// Appends a page of records, returning how many rows were written
    pub fn append_all<'a, I>(&self, records: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut written = 0;
        for record in records {
            if self.append(record)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Encodes one record as a complete CSV line
    fn encode_row(&self, record: &Record) -> StorageResult<Vec<u8>> {
        let posted_at = record
            .posted_at
            .with_timezone(&self.zone)
            .to_rfc3339_opts(SecondsFormat::Secs, false);
        let text = flatten_newlines(&record.text);
        let fields = [
            posted_at,
            record.id.to_string(),
            record.author.clone(),
            text,
            record.geo_enabled.to_string(),
            record.lon.map(|v| v.to_string()).unwrap_or_default(),
            record.lat.map(|v| v.to_string()).unwrap_or_default(),
        ];

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(&fields)?;
        writer
            .into_inner()
            .map_err(|e| StorageError::io(&self.path, e.into_error()))
    }
}

/// Replaces every line break with a single space
fn flatten_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
