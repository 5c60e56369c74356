//! Calendar months and the rotation state built on them

use crate::StorageError;
use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, rendered as "YYYY-MM"
///
/// Rows of the data log start with their timestamp, so a period's display
/// form is also the line prefix of every row posted in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Creates a period, returning `None` for a month outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (0..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// The month containing `instant` as seen in `zone`
    pub fn containing(instant: DateTime<Utc>, zone: &FixedOffset) -> Self {
        let local = zone.from_utc_datetime(&instant.naive_utc());
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// The month after this one
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Line prefix shared by every row of this month
    pub fn prefix(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidPeriod(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(invalid());
        }
        if !s[..4].chars().all(|c| c.is_ascii_digit()) || !s[5..].chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let year = s[..4].parse().map_err(|_| invalid())?;
        let month = s[5..].parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Period {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// Builds the fixed-offset zone used for timestamps and month boundaries
///
/// Offsets outside chrono's range fall back to UTC.
pub fn zone_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

/// Which month the active log belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationState {
    /// Month whose rows currently belong in the active log
    pub active_period: Period,

    /// Set when a wake-up observed a later month; cleared by a rotation
    pub pending: bool,
}

impl RotationState {
    pub fn new(active_period: Period) -> Self {
        Self {
            active_period,
            pending: false,
        }
    }

    /// Marks a rotation pending if `current` is past the active period
    ///
    /// Returns whether a rotation is pending afterwards.
    pub fn observe(&mut self, current: Period) -> bool {
        if current > self.active_period {
            self.pending = true;
        }
        self.pending
    }

    /// Whether a rotation should run now
    pub fn is_due(&self, current: Period) -> bool {
        self.pending || current > self.active_period
    }

    /// Records a completed rotation into `next`
    pub fn advance(&mut self, next: Period) {
        self.active_period = next;
        self.pending = false;
    }
}
