//! Crawl checkpoint file
//!
//! Saves the lower bound of the crawl and the active month so a restarted
//! process continues where the last one stopped instead of the configured
//! starting point.

use crate::storage::Period;
use crate::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted crawl position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub since_id: u64,
    pub active_period: Period,
}

impl Checkpoint {
    /// Loads a checkpoint, returning `None` if the file does not exist
    pub fn load(path: &Path) -> StorageResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::Checkpoint(format!("{}: {}", path.display(), e)))
    }

    /// Writes the checkpoint through a temporary file renamed into place
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::Checkpoint(e.to_string()))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(|e| StorageError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))?;
        tracing::debug!(
            "Checkpoint saved: since_id={}, active_period={}",
            self.since_id,
            self.active_period
        );
        Ok(())
    }
}
