//! Time types for offer validity
//!
//! Timestamps are integral seconds since the Unix epoch. The state machine
//! never reads a clock; every transition is handed `now` by its caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(at) => write!(f, "{}", at.to_rfc3339()),
            None => write!(f, "{}s", self.0),
        }
    }
}

/// Half-open interval `[start, end)` during which payment is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl ValidityWindow {
    /// Returns `None` unless `start < end`
    pub fn new(start: Timestamp, end: Timestamp) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn contains(&self, now: Timestamp) -> bool {
        self.start <= now && now < self.end
    }

    pub fn has_expired(&self, now: Timestamp) -> bool {
        now >= self.end
    }
}
