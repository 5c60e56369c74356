//! Position of the incremental crawl

use crate::record::Record;

/// Bounds of the current sweep
///
/// Only the crawl machine mutates a cursor; the paginator reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlCursor {
    /// Exclusive lower bound; 0 means no lower bound
    pub since_id: u64,

    /// Upper bound while walking back through history; `None` means newest
    pub max_id: Option<u64>,

    /// Newest id observed in the current sweep
    pub latest_seen_id: Option<u64>,
}

impl CrawlCursor {
    /// A cursor that will fetch everything newer than `since_id`
    pub fn starting_at(since_id: u64) -> Self {
        Self {
            since_id,
            max_id: None,
            latest_seen_id: None,
        }
    }

    /// Remembers the newest id of the sweep from the first non-empty page
    pub fn observe_page(&mut self, page: &[Record]) {
        if self.latest_seen_id.is_none() {
            if let Some(first) = page.first() {
                self.latest_seen_id = Some(first.id);
            }
        }
    }

    /// Moves the upper bound below the page just consumed
    pub fn advance(&mut self, new_max_id: u64) {
        self.max_id = Some(new_max_id);
    }

    /// Starts a new sweep anchored at the newest id already covered
    ///
    /// Returns the new `since_id`.
    pub fn rewind(&mut self) -> u64 {
        if let Some(latest) = self.latest_seen_id.take() {
            self.since_id = latest;
        }
        self.max_id = None;
        self.since_id
    }
}
