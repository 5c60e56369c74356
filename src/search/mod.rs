//! Search capability
//!
//! The crawl machine talks to the remote API only through [`SearchClient`]:
//! run one bounded query, or report the current quota. Everything about the
//! wire format lives behind it.

mod client;
mod types;

pub use client::{build_http_client, HttpSearchClient, SEARCH_ENDPOINT};
pub use types::{QuerySpec, RawCoordinates, RawStatus, RawUser, DEFAULT_PAGE_SIZE};

use crate::quota::QuotaState;
use crate::SearchError;
use async_trait::async_trait;

/// A client that can execute a search query and report its quota
///
/// Any error is transient from the caller's point of view.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Runs one query and returns its results, newest first
    async fn search(&self, query: &QuerySpec) -> Result<Vec<RawStatus>, SearchError>;

    /// Reports the remaining call budget and its reset time
    async fn check_quota(&self) -> Result<QuotaState, SearchError>;
}
