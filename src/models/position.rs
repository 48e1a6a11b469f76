use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// A single fix pushed by the platform location service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Ground speed in metres per second, when the platform reports one.
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, speed: Option<f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            speed,
            timestamp,
        }
    }

    /// Reported speed in km/h. A missing speed reads as standing still.
    pub fn speed_kmh(&self) -> f64 {
        self.speed.unwrap_or(0.0) * 3.6
    }
}
