//! Search-Harvest: an incremental collector for a rate-limited search API
//!
//! This crate polls a paginated search endpoint, harvests records newer than the
//! last known position, appends them to a CSV log, and rotates that log into
//! per-month archives.

pub mod clock;
pub mod config;
pub mod crawler;
pub mod quota;
pub mod record;
pub mod search;
pub mod storage;

use thiserror::Error;

/// Main error type for Search-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Data contract violation: {0}")]
    DataContract(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Process exit code for a fatal error
    ///
    /// | Error | Code |
    /// |-------|------|
    /// | Configuration | 1 |
    /// | Data contract violation | 2 |
    /// | Storage / rotation / IO | 3 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::DataContract(_) => 2,
            Self::Search(_) | Self::Storage(_) | Self::Io(_) => 3,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised by the remote search capability
///
/// Every variant is treated as transient by the crawl machine.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Malformed payload: {0}")]
    Payload(String),
}

/// Errors raised by the data log, rotation and checkpoint files
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Invalid period '{0}', expected YYYY-MM")]
    InvalidPeriod(String),
}

impl StorageError {
    /// Wraps an IO error with the path it happened on
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type alias for Search-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlCursor, Harvester, Transition};
pub use quota::{QuotaState, QuotaTracker};
pub use record::Record;
pub use search::{HttpSearchClient, QuerySpec, SearchClient};
pub use storage::{CsvLog, Period, RotationState};
