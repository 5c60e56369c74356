//! Query and raw result types for the search endpoint

use serde::Deserialize;
use std::fmt;

/// Page size the endpoint uses when the base query does not set `count`
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// A fully bounded search request
///
/// `since_id` is an exclusive lower bound on the ids the endpoint may return;
/// `max_id` caps them from above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub base: String,
    pub since_id: Option<u64>,
    pub max_id: Option<u64>,
}

impl QuerySpec {
    /// The base query with no bounds
    pub fn unbounded(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            since_id: None,
            max_id: None,
        }
    }

    /// Renders the query string sent to the endpoint
    pub fn to_query_string(&self) -> String {
        let mut query = self.base.clone();
        if let Some(since_id) = self.since_id {
            query.push_str(&format!("&since_id={}", since_id));
        }
        if let Some(max_id) = self.max_id {
            query.push_str(&format!("&max_id={}", max_id));
        }
        query
    }

    /// Number of records one page is asked to hold (the `count` parameter)
    pub fn page_size(&self) -> u32 {
        url::form_urlencoded::parse(self.base.as_bytes())
            .find(|(key, _)| key == "count")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// One search result as the endpoint returns it
///
/// Every field is optional here; `Record::from_raw` decides what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatus {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub id_str: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
}

/// Author block of a raw result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub geo_enabled: Option<bool>,
}

/// GeoJSON-style coordinates of a raw result
#[derive(Debug, Clone, Deserialize)]
pub struct RawCoordinates {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// Body of a search response
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub statuses: Vec<RawStatus>,
}
