//! Query windows and response classification
//!
//! A sweep walks backward from the newest record down to `since_id`, one page
//! at a time. Each page's oldest id minus one becomes the next upper bound, so
//! the walk strictly decreases and never re-fetches a page.

use crate::crawler::CrawlCursor;
use crate::record::Record;
use crate::search::QuerySpec;

/// What a page means for the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// More history below this page; continue with `new_max_id`
    Progress { new_max_id: u64 },

    /// The page is empty
    CaughtUp,

    /// The page reaches down into ids at or below `since_id`
    WindowExhausted,
}

/// Builds the next query for `cursor`
///
/// # Cases (in priority order)
///
/// | Cursor | Query |
/// |--------|-------|
/// | `since_id == 0` | base query, unbounded |
/// | `max_id` unset | base + `since_id` |
/// | otherwise | base + `since_id` + `max_id` |
///
/// An unset lower bound wins over any upper bound: with no history the
/// newest page is always what is wanted.
pub fn next_query(cursor: &CrawlCursor, base_query: &str) -> QuerySpec {
    let mut query = QuerySpec::unbounded(base_query);
    if cursor.since_id == 0 {
        return query;
    }
    query.since_id = Some(cursor.since_id);
    query.max_id = cursor.max_id;
    query
}

/// Classifies a page against the cursor that requested it
pub fn classify(page: &[Record], cursor: &CrawlCursor) -> Classification {
    let Some(oldest) = page.iter().map(|r| r.id).min() else {
        return Classification::CaughtUp;
    };

    match oldest.checked_sub(1) {
        Some(new_max_id) if new_max_id > cursor.since_id => {
            Classification::Progress { new_max_id }
        }
        _ => Classification::WindowExhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const BASE: &str = "q=hello&count=3";

    fn page(ids: &[u64]) -> Vec<Record> {
        ids.iter()
            .map(|&id| Record {
                posted_at: Utc::now(),
                id,
                author: "a".to_string(),
                text: "t".to_string(),
                geo_enabled: false,
                lon: None,
                lat: None,
            })
            .collect()
    }

    #[test]
    fn test_next_query_cases() {
        let mut cursor = CrawlCursor::starting_at(0);
        assert_eq!(next_query(&cursor, BASE).to_query_string(), BASE);

        cursor.since_id = 10;
        assert_eq!(
            next_query(&cursor, BASE).to_query_string(),
            "q=hello&count=3&since_id=10"
        );

        cursor.max_id = Some(50);
        assert_eq!(
            next_query(&cursor, BASE).to_query_string(),
            "q=hello&count=3&since_id=10&max_id=50"
        );
    }

    #[test]
    fn test_unset_lower_bound_wins_over_stale_upper_bound() {
        let cursor = CrawlCursor {
            since_id: 0,
            max_id: Some(50),
            latest_seen_id: None,
        };
        assert_eq!(next_query(&cursor, BASE), QuerySpec::unbounded(BASE));
    }

    #[test]
    fn test_classify_empty_is_caught_up() {
        let cursor = CrawlCursor::starting_at(10);
        assert_eq!(classify(&[], &cursor), Classification::CaughtUp);
    }

    #[test]
    fn test_classify_progress() {
        let cursor = CrawlCursor::starting_at(10);
        assert_eq!(
            classify(&page(&[30, 20, 15]), &cursor),
            Classification::Progress { new_max_id: 14 }
        );
    }

    #[test]
    fn test_classify_boundary_is_exhausted() {
        // oldest - 1 == since_id
        let cursor = CrawlCursor::starting_at(14);
        assert_eq!(
            classify(&page(&[30, 20, 15]), &cursor),
            Classification::WindowExhausted
        );

        // One above the boundary still progresses
        let cursor = CrawlCursor::starting_at(13);
        assert_eq!(
            classify(&page(&[30, 20, 15]), &cursor),
            Classification::Progress { new_max_id: 14 }
        );
    }

    #[test]
    fn test_classify_overlap_is_exhausted() {
        let cursor = CrawlCursor::starting_at(500);
        assert_eq!(
            classify(&page(&[700, 600, 500]), &cursor),
            Classification::WindowExhausted
        );
        assert_eq!(
            classify(&page(&[0]), &CrawlCursor::starting_at(0)),
            Classification::WindowExhausted
        );
    }

    #[test]
    fn test_classify_uses_oldest_regardless_of_order() {
        let cursor = CrawlCursor::starting_at(1);
        assert_eq!(
            classify(&page(&[20, 40, 30]), &cursor),
            Classification::Progress { new_max_id: 19 }
        );
    }

    #[test]
    fn test_walk_strictly_decreases_and_never_repeats() {
        // Newest-first pages of a backward walk over ids 100..=11
        let history: Vec<u64> = (11..=100).rev().collect();
        let mut cursor = CrawlCursor::starting_at(10);
        let mut seen_queries = Vec::new();
        let mut last_max = u64::MAX;

        loop {
            let query = next_query(&cursor, BASE);
            assert!(!seen_queries.contains(&query), "re-requested {}", query);
            seen_queries.push(query.clone());

            let upper = query.max_id.unwrap_or(u64::MAX);
            let ids: Vec<u64> = history
                .iter()
                .copied()
                .filter(|&id| id <= upper && id > cursor.since_id)
                .take(7)
                .collect();
            let records = page(&ids);
            cursor.observe_page(&records);

            match classify(&records, &cursor) {
                Classification::Progress { new_max_id } => {
                    assert!(new_max_id < last_max);
                    assert!(ids.iter().all(|&id| id > new_max_id));
                    last_max = new_max_id;
                    cursor.advance(new_max_id);
                }
                Classification::CaughtUp | Classification::WindowExhausted => break,
            }
        }

        // 90 records in pages of 7: twelve full pages, the 13th reaches since_id
        assert_eq!(seen_queries.len(), 13);
        assert_eq!(cursor.latest_seen_id, Some(100));
    }
}
