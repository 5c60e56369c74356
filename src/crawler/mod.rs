//! Crawler module for incremental harvesting
//!
//! This module contains the core crawl logic, including:
//! - The cursor bounding each sweep
//! - Query construction and page classification
//! - The state machine driving fetch, store, rewind and idle

mod cursor;
mod machine;
mod paginator;

pub use cursor::CrawlCursor;
pub use machine::{CrawlState, HarvestSettings, Harvester, Phase, Transition};
pub use paginator::{classify, next_query, Classification};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::search::HttpSearchClient;
use crate::Result;
use std::sync::Arc;

/// Runs the harvest loop against the configured endpoint
///
/// This is the main entry point for harvesting. It will:
/// 1. Build the HTTP search client
/// 2. Restore the cursor from the checkpoint or configuration
/// 3. Loop over fetch, store, rewind and idle until a fatal error
///
/// # Arguments
///
/// * `config` - The validated configuration
///
/// # Returns
///
/// Only returns on a fatal error.
pub async fn harvest(config: Config) -> Result<()> {
    let client = HttpSearchClient::new(&config.search.base_url, &config.search.bearer_token)?;
    let mut harvester = Harvester::from_config(&config, client, Arc::new(SystemClock))?;
    harvester.run().await
}
