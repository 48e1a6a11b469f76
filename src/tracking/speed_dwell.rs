//! Speed-based stop detection.
//!
//! Reported speed at or below [`SPEED_THRESHOLD_KMH`] arms a dwell timer for
//! `stop_duration`; faster fixes disarm it. The owner runs the timer and hands
//! back its generation when it fires, so a timer armed before a disarm (or
//! before the session ended) is ignored.

use std::time::Duration;

use super::detector::{check_gates, DetectionParams, Gate};
use crate::models::{Coordinate, PositionSample};

pub const SPEED_THRESHOLD_KMH: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SpeedObservation {
    Moving,
    /// Slow fix while a timer is already armed.
    TimerRunning,
    ArmTimer { generation: u64, delay: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerOutcome {
    Stale,
    Suppressed(Gate),
    Candidate(Coordinate),
}

#[derive(Debug, Clone, Copy)]
struct PendingDwell {
    generation: u64,
    location: Coordinate,
}

#[derive(Debug, Clone)]
pub struct SpeedDwellDetector {
    params: DetectionParams,
    origin: Option<Coordinate>,
    generation: u64,
    pending: Option<PendingDwell>,
    last_confirmed_stop: Option<Coordinate>,
}

impl SpeedDwellDetector {
    pub fn new(params: DetectionParams, origin: Option<Coordinate>) -> Self {
        Self {
            params,
            origin,
            generation: 0,
            pending: None,
            last_confirmed_stop: None,
        }
    }

    pub fn observe(&mut self, sample: &PositionSample) -> SpeedObservation {
        if sample.speed_kmh() > SPEED_THRESHOLD_KMH {
            self.disarm();
            return SpeedObservation::Moving;
        }

        if self.pending.is_some() {
            return SpeedObservation::TimerRunning;
        }

        self.generation += 1;
        self.pending = Some(PendingDwell {
            generation: self.generation,
            location: sample.coordinate,
        });

        SpeedObservation::ArmTimer {
            generation: self.generation,
            delay: self.params.stop_duration.to_std().unwrap_or(Duration::ZERO),
        }
    }

    /// Gates are checked against the fix that armed the timer. Pass or fail,
    /// the timer is spent and the next slow fix arms a new one.
    pub fn timer_fired(&mut self, generation: u64) -> TimerOutcome {
        let pending = match self.pending {
            Some(pending) if pending.generation == generation => pending,
            _ => return TimerOutcome::Stale,
        };
        self.pending = None;

        if let Err(gate) = check_gates(
            &self.params,
            self.origin.as_ref(),
            self.last_confirmed_stop.as_ref(),
            &pending.location,
        ) {
            return TimerOutcome::Suppressed(gate);
        }

        self.last_confirmed_stop = Some(pending.location);
        TimerOutcome::Candidate(pending.location)
    }

    pub fn disarm(&mut self) {
        if self.pending.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_confirmed_stop(&self) -> Option<Coordinate> {
        self.last_confirmed_stop
    }
}
