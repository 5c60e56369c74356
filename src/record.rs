//! Typed search records
//!
//! Raw results are validated here, once, at the boundary. A result that the
//! endpoint returned but that cannot become a [`Record`] means the assumptions
//! about the response shape are broken, which is fatal.

use crate::search::RawStatus;
use crate::HarvestError;
use chrono::{DateTime, Utc};

/// Prefix marking a re-shared record; such records are never written
pub const RETWEET_MARKER: &str = "RT @";

/// Timestamp format of the search endpoint (e.g. "Wed Aug 27 13:08:45 +0000 2008")
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// One harvested record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub posted_at: DateTime<Utc>,
    pub id: u64,
    pub author: String,
    pub text: String,
    pub geo_enabled: bool,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl Record {
    /// Builds a record from a raw search result
    ///
    /// # Errors
    ///
    /// `HarvestError::DataContract` when the id, timestamp, author, or text
    /// is missing or malformed.
    pub fn from_raw(raw: RawStatus) -> Result<Self, HarvestError> {
        let id = extract_id(&raw)?;

        let created_at = raw
            .created_at
            .as_deref()
            .ok_or_else(|| contract(id, "missing created_at"))?;
        let posted_at = parse_created_at(created_at)
            .ok_or_else(|| contract(id, &format!("unparseable created_at '{}'", created_at)))?;

        let user = raw.user.ok_or_else(|| contract(id, "missing user"))?;
        let author = user
            .screen_name
            .ok_or_else(|| contract(id, "missing user.screen_name"))?;

        let text = raw.text.ok_or_else(|| contract(id, "missing text"))?;

        let (lon, lat) = match raw.coordinates {
            Some(coords) if coords.kind == "Point" && coords.coordinates.len() >= 2 => {
                (Some(coords.coordinates[0]), Some(coords.coordinates[1]))
            }
            _ => (None, None),
        };

        Ok(Self {
            posted_at,
            id,
            author,
            text,
            geo_enabled: user.geo_enabled.unwrap_or(false),
            lon,
            lat,
        })
    }

    /// Whether this record re-shares another one
    pub fn is_retweet(&self) -> bool {
        self.text.starts_with(RETWEET_MARKER)
    }
}

/// Converts a whole page, failing on the first record that breaks the contract
pub fn records_from_page(page: Vec<RawStatus>) -> Result<Vec<Record>, HarvestError> {
    page.into_iter().map(Record::from_raw).collect()
}

fn extract_id(raw: &RawStatus) -> Result<u64, HarvestError> {
    if let Some(id) = raw.id {
        return Ok(id);
    }
    raw.id_str
        .as_deref()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| HarvestError::DataContract("search result without a usable id".to_string()))
}

fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, CREATED_AT_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn contract(id: u64, message: &str) -> HarvestError {
    HarvestError::DataContract(format!("record {}: {}", id, message))
}
