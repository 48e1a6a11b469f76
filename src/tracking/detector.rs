//! Displacement-based stop detection.
//!
//! Each fix is compared with the last checkpoint. A move of more than
//! [`MOVEMENT_THRESHOLD_M`] makes the fix the new checkpoint and cancels any
//! dwell in progress; anything closer counts as standing still. Once the
//! dwell lasts `stop_duration`, the fix becomes a delivery candidate if it
//! passes every [`Gate`].
//!
//! A rejected fix leaves the dwell armed, so the gates are re-checked on every
//! following fix until one passes or the carrier moves off.

use chrono::{DateTime, Duration, Utc};

use crate::{
    models::{Coordinate, PositionSample},
    settings::TrackerSettings,
    utils::geo::distance_meters,
};

pub const MOVEMENT_THRESHOLD_M: f64 = 50.0;
pub const DUPLICATE_RADIUS_M: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub auto_count: bool,
    pub stop_duration: Duration,
    pub base_radius_m: f64,
}

impl From<&TrackerSettings> for DetectionParams {
    fn from(settings: &TrackerSettings) -> Self {
        Self {
            auto_count: settings.auto_count,
            stop_duration: i64::try_from(settings.stop_duration_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            base_radius_m: settings.base_radius_m,
        }
    }
}

/// Why a dwell that ran long enough did not produce a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    AutoCountDisabled,
    NoOrigin,
    NearOrigin,
    NearLastStop,
}

/// Checked in order; the first failing gate wins.
pub(crate) fn check_gates(
    params: &DetectionParams,
    origin: Option<&Coordinate>,
    last_stop: Option<&Coordinate>,
    at: &Coordinate,
) -> Result<(), Gate> {
    if !params.auto_count {
        return Err(Gate::AutoCountDisabled);
    }
    let origin = origin.ok_or(Gate::NoOrigin)?;
    if distance_meters(at, origin) < params.base_radius_m {
        return Err(Gate::NearOrigin);
    }
    if let Some(last) = last_stop {
        if distance_meters(at, last) < DUPLICATE_RADIUS_M {
            return Err(Gate::NearLastStop);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// First fix of the session; only sets the checkpoint.
    FirstFix,
    Moving { distance_m: f64 },
    Dwelling { elapsed: Duration },
    Suppressed(Gate),
    Candidate(Coordinate),
}

#[derive(Debug, Clone)]
pub struct StopDetector {
    params: DetectionParams,
    origin: Option<Coordinate>,
    last_position: Option<Coordinate>,
    stop_started_at: Option<DateTime<Utc>>,
    last_confirmed_stop: Option<Coordinate>,
}

impl StopDetector {
    pub fn new(params: DetectionParams, origin: Option<Coordinate>) -> Self {
        Self {
            params,
            origin,
            last_position: None,
            stop_started_at: None,
            last_confirmed_stop: None,
        }
    }

    /// Fix timestamps are the clock; samples are assumed to arrive in order.
    pub fn observe(&mut self, sample: &PositionSample) -> Observation {
        let here = sample.coordinate;
        let now = sample.timestamp;

        let Some(checkpoint) = self.last_position else {
            self.last_position = Some(here);
            return Observation::FirstFix;
        };

        let distance_m = distance_meters(&checkpoint, &here);
        if distance_m > MOVEMENT_THRESHOLD_M {
            self.last_position = Some(here);
            self.stop_started_at = None;
            return Observation::Moving { distance_m };
        }

        let started = *self.stop_started_at.get_or_insert(now);
        let elapsed = now - started;
        if elapsed < self.params.stop_duration {
            return Observation::Dwelling { elapsed };
        }

        if let Err(gate) = check_gates(
            &self.params,
            self.origin.as_ref(),
            self.last_confirmed_stop.as_ref(),
            &here,
        ) {
            return Observation::Suppressed(gate);
        }

        self.last_confirmed_stop = Some(here);
        self.stop_started_at = None;
        Observation::Candidate(here)
    }

    pub fn reset(&mut self) {
        self.last_position = None;
        self.stop_started_at = None;
        self.last_confirmed_stop = None;
    }

    pub fn origin(&self) -> Option<Coordinate> {
        self.origin
    }

    pub fn last_position(&self) -> Option<Coordinate> {
        self.last_position
    }

    pub fn stop_started_at(&self) -> Option<DateTime<Utc>> {
        self.stop_started_at
    }

    pub fn last_confirmed_stop(&self) -> Option<Coordinate> {
        self.last_confirmed_stop
    }
}
