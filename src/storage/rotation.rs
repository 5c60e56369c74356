//! Monthly rotation of the data log
//!
//! A rotation moves the rows of the outgoing month into `<data-dir>/<YYYY-MM>.csv`
//! and leaves the active log holding only rows of the incoming month.
//!
//! # Steps
//!
//! 1. Read the active log together with the `.bak` of an interrupted rotation
//! 2. Save everything read as the active log's `.bak`
//! 3. Partition the lines by month prefix
//! 4. Merge with any existing archive, copy that archive to a free backup name
//! 5. Write the deduplicated, naturally sorted archive
//! 6. Replace the active log with the incoming month's lines
//! 7. Retire the `.bak` under a free name of its own
//!
//! Every file is written to a temporary file and renamed into place, and no
//! rename ever lands on an existing backup. While the `.bak` of the active log
//! exists a rotation is in progress, and the next attempt merges it back in,
//! so a crash at any step loses no row even if new rows were appended since.

use crate::storage::Period;
use crate::{StorageError, StorageResult};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix given to any file before it is replaced
pub const BACKUP_SUFFIX: &str = ".bak";

const TEMP_SUFFIX: &str = ".tmp";

/// Outcome of one rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub archive_path: PathBuf,
    /// Where the pre-rotation content of the active log was kept
    pub backup_path: PathBuf,
    /// Distinct lines in the archive after the rotation
    pub archived: usize,
    /// Lines carried into the fresh active log
    pub carried: usize,
    /// Lines matching neither month, not kept anywhere but the backup
    pub dropped: usize,
}

/// Splits the active log into monthly archives
#[derive(Debug, Clone)]
pub struct Rotator {
    data_file: PathBuf,
    data_dir: PathBuf,
}

impl Rotator {
    pub fn new(data_file: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Path of the archive holding `period`
    pub fn archive_path(&self, period: Period) -> PathBuf {
        self.data_dir.join(format!("{}.csv", period))
    }

    /// Rotates `period` out of the active log, keeping `next` in it
    ///
    /// # Errors
    ///
    /// Any IO failure is returned as is; the caller treats it as fatal.
    pub fn rotate(&self, period: Period, next: Period) -> StorageResult<RotationReport> {
        tracing::info!("Rotating data log {} -> {}", period, next);

        std::fs::create_dir_all(&self.data_dir).map_err(|e| StorageError::io(&self.data_dir, e))?;
        let archive_path = self.archive_path(period);

        // Lines of an interrupted rotation come first; they are the older ones
        let active_backup = backup_path(&self.data_file);
        let mut lines = Vec::new();
        if active_backup.exists() {
            tracing::warn!(
                "Found {} from an interrupted rotation, merging it back in",
                active_backup.display()
            );
            lines.extend(read_lines(&active_backup)?);
        }
        if self.data_file.exists() {
            lines.extend(read_lines(&self.data_file)?);
        }
        let lines = dedup_in_order(lines);
        write_lines_atomic(&active_backup, &lines)?;

        let outgoing = period.prefix();
        let incoming = next.prefix();
        let mut last_month = BTreeSet::new();
        let mut carried = Vec::new();
        let mut dropped = 0;
        for line in &lines {
            if line.starts_with(&outgoing) {
                last_month.insert(line.clone());
            } else if line.starts_with(&incoming) {
                carried.push(line.clone());
            } else {
                dropped += 1;
            }
        }

        if archive_path.exists() {
            for line in read_lines(&archive_path)? {
                last_month.insert(line);
            }
            let archive_backup = free_path(backup_path(&archive_path));
            tracing::info!("Backing up existing archive to {}", archive_backup.display());
            std::fs::copy(&archive_path, &archive_backup)
                .map_err(|e| StorageError::io(&archive_path, e))?;
        }

        let mut sorted: Vec<String> = last_month.into_iter().collect();
        sorted.sort_by(|a, b| natural_cmp(a, b));
        write_lines_atomic(&archive_path, &sorted)?;
        tracing::info!("Archived {} lines to {}", sorted.len(), archive_path.display());

        write_lines_atomic(&self.data_file, &carried)?;
        tracing::info!("Active log restarted with {} lines of {}", carried.len(), next);

        let mut retired = self.data_file.as_os_str().to_owned();
        retired.push(format!(".{}{}", period, BACKUP_SUFFIX));
        let retired = free_path(PathBuf::from(retired));
        std::fs::rename(&active_backup, &retired)
            .map_err(|e| StorageError::io(&active_backup, e))?;
        if dropped > 0 {
            tracing::warn!(
                "{} lines match neither {} nor {} and are kept only in {}",
                dropped,
                period,
                next,
                retired.display()
            );
        }

        Ok(RotationReport {
            archive_path,
            backup_path: retired,
            archived: sorted.len(),
            carried: carried.len(),
            dropped,
        })
    }
}

/// Path with the backup suffix appended
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// `path` itself if nothing exists there, else the first free `path.N`
fn free_path(path: PathBuf) -> PathBuf {
    let mut candidate = path.clone();
    let mut n = 0;
    while candidate.exists() {
        n += 1;
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        candidate = PathBuf::from(name);
    }
    candidate
}

/// Drops repeated lines, keeping the first occurrence of each
fn dedup_in_order(lines: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| seen.insert(line.clone()))
        .collect()
}

fn read_lines(path: &Path) -> StorageResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    Ok(content
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Writes `lines` to a temporary file and renames it over `path`
fn write_lines_atomic(path: &Path, lines: &[String]) -> StorageResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TEMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
    for line in lines {
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| StorageError::io(&tmp, e))?;
    }
    file.sync_all().map_err(|e| StorageError::io(&tmp, e))?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
}

/// Compares strings so that runs of digits order by numeric value
///
/// "id9" sorts before "id10"; everything else compares character by character.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let l_trim = l_run.trim_start_matches('0');
                let r_trim = r_run.trim_start_matches('0');
                let ord = l_trim
                    .len()
                    .cmp(&r_trim.len())
                    .then_with(|| l_trim.cmp(r_trim))
                    .then_with(|| l_run.len().cmp(&r_run.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}
