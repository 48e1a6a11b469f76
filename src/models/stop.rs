//! Detected stops awaiting (or past) manual audit.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StopStatus {
    Pending,
    Confirmed,
    Ignored,
}

impl StopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopStatus::Pending => "pending",
            StopStatus::Confirmed => "confirmed",
            StopStatus::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub location: Coordinate,
    pub status: StopStatus,
}

impl Stop {
    pub fn new(location: Coordinate, detected_at: DateTime<Utc>, status: StopStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: detected_at.timestamp_millis(),
            location,
            status,
        }
    }

    pub fn pending(location: Coordinate, detected_at: DateTime<Utc>) -> Self {
        Self::new(location, detected_at, StopStatus::Pending)
    }

    pub fn detected_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            self.location.latitude, self.location.longitude
        )
    }
}
