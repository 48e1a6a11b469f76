use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    detector::{DetectionParams, Gate, Observation, StopDetector},
    speed_dwell::{SpeedDwellDetector, SpeedObservation},
};
use crate::{
    models::{Coordinate, PositionSample},
    platform::LocationError,
    settings::{DetectionMode, TrackerSettings},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    #[default]
    Paused,
    Active,
    /// The stream reported a failure; the subscription stays open and the
    /// next good fix returns the session to `Active`.
    GpsError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Muted,
    Primary,
    Destructive,
}

impl TrackingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TrackingStatus::Paused => "Paused",
            TrackingStatus::Active => "Tracking active",
            TrackingStatus::GpsError => "GPS error",
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            TrackingStatus::Paused => StatusTone::Muted,
            TrackingStatus::Active => StatusTone::Primary,
            TrackingStatus::GpsError => StatusTone::Destructive,
        }
    }

    /// `GpsError` still has a live session behind it.
    pub fn is_tracking(&self) -> bool {
        match self {
            TrackingStatus::Paused => false,
            TrackingStatus::Active | TrackingStatus::GpsError => true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionDetector {
    Displacement(StopDetector),
    Speed(SpeedDwellDetector),
}

/// What the loop worker has to act on after feeding one fix.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorStep {
    Nothing,
    Suppressed(Gate),
    Candidate(Coordinate),
    ArmTimer {
        generation: u64,
        delay: std::time::Duration,
    },
}

impl From<Observation> for DetectorStep {
    fn from(observation: Observation) -> Self {
        match observation {
            Observation::FirstFix | Observation::Moving { .. } | Observation::Dwelling { .. } => {
                DetectorStep::Nothing
            }
            Observation::Suppressed(gate) => DetectorStep::Suppressed(gate),
            Observation::Candidate(location) => DetectorStep::Candidate(location),
        }
    }
}

impl From<SpeedObservation> for DetectorStep {
    fn from(observation: SpeedObservation) -> Self {
        match observation {
            SpeedObservation::Moving | SpeedObservation::TimerRunning => DetectorStep::Nothing,
            SpeedObservation::ArmTimer { generation, delay } => {
                DetectorStep::ArmTimer { generation, delay }
            }
        }
    }
}

impl SessionDetector {
    pub fn for_settings(settings: &TrackerSettings, origin: Coordinate) -> Self {
        let params = DetectionParams::from(settings);
        match settings.detection_mode {
            DetectionMode::Displacement => {
                SessionDetector::Displacement(StopDetector::new(params, Some(origin)))
            }
            DetectionMode::Speed => {
                SessionDetector::Speed(SpeedDwellDetector::new(params, Some(origin)))
            }
        }
    }

    pub fn observe(&mut self, sample: &PositionSample) -> DetectorStep {
        match self {
            SessionDetector::Displacement(detector) => detector.observe(sample).into(),
            SessionDetector::Speed(detector) => detector.observe(sample).into(),
        }
    }
}

/// In-memory session state. `generation` changes on every start and stop so
/// work queued for an older session can tell it is stale.
#[derive(Debug, Clone, Default)]
pub struct TrackingState {
    pub status: TrackingStatus,
    pub generation: u64,
    pub company_id: Option<String>,
    pub origin: Option<Coordinate>,
    pub started_at: Option<DateTime<Utc>>,
    pub settings: TrackerSettings,
    pub last_fix_at: Option<DateTime<Utc>>,
    pub last_error: Option<LocationError>,
    pub stops_detected: u32,
    pub detector: Option<SessionDetector>,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(
        &mut self,
        company_id: String,
        origin: Coordinate,
        settings: TrackerSettings,
        started_at: DateTime<Utc>,
    ) -> u64 {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            status: TrackingStatus::Active,
            generation,
            company_id: Some(company_id),
            origin: Some(origin),
            started_at: Some(started_at),
            detector: Some(SessionDetector::for_settings(&settings, origin)),
            settings,
            last_fix_at: None,
            last_error: None,
            stops_detected: 0,
        };
        generation
    }

    /// Back to `Paused`. `stops_detected` stays readable until the next
    /// session begins.
    pub fn end_session(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            stops_detected: self.stops_detected,
            ..Self::default()
        };
    }

    /// Ends the session because the stream can't deliver any more fixes.
    pub fn abandon_session(&mut self, err: LocationError) {
        self.end_session();
        self.last_error = Some(err);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.status.is_tracking() && self.generation == generation
    }

    /// A good fix clears any GPS error.
    pub fn record_fix(&mut self, at: DateTime<Utc>) {
        self.last_fix_at = Some(at);
        self.last_error = None;
        if self.status == TrackingStatus::GpsError {
            self.status = TrackingStatus::Active;
        }
    }

    /// Returns `true` when this error moved the session out of `Active`.
    pub fn record_error(&mut self, err: LocationError) -> bool {
        self.last_error = Some(err);
        let entered = self.status == TrackingStatus::Active;
        if self.status.is_tracking() {
            self.status = TrackingStatus::GpsError;
        }
        entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(state: &mut TrackingState) -> u64 {
        state.begin_session(
            "acme".into(),
            Coordinate::new(0.0, 0.0),
            TrackerSettings::default(),
            Utc::now(),
        )
    }

    #[test]
    fn generations_advance_across_start_and_stop() {
        let mut state = TrackingState::new();
        let first = begin(&mut state);
        assert!(state.is_current(first));

        state.end_session();
        assert_eq!(state.status, TrackingStatus::Paused);
        assert!(!state.is_current(first));
        assert!(state.detector.is_none());

        let second = begin(&mut state);
        assert_ne!(first, second);
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
    }

    #[test]
    fn stop_count_survives_end_of_session() {
        let mut state = TrackingState::new();
        begin(&mut state);
        state.stops_detected = 3;

        state.end_session();
        assert_eq!(state.stops_detected, 3);

        begin(&mut state);
        assert_eq!(state.stops_detected, 0);
    }

    #[test]
    fn abandoned_session_is_paused_with_its_error() {
        let mut state = TrackingState::new();
        let generation = begin(&mut state);

        state.abandon_session(LocationError::PositionUnavailable);
        assert_eq!(state.status, TrackingStatus::Paused);
        assert!(!state.is_current(generation));
        assert_eq!(state.origin, None);
        assert_eq!(state.last_error, Some(LocationError::PositionUnavailable));
    }

    #[test]
    fn gps_error_is_transient() {
        let mut state = TrackingState::new();
        let generation = begin(&mut state);

        assert!(state.record_error(LocationError::Timeout));
        assert_eq!(state.status, TrackingStatus::GpsError);
        // still the same live session
        assert!(state.is_current(generation));
        // repeated errors don't re-enter
        assert!(!state.record_error(LocationError::Timeout));

        state.record_fix(Utc::now());
        assert_eq!(state.status, TrackingStatus::Active);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn errors_while_paused_leave_status_alone() {
        let mut state = TrackingState::new();
        assert!(!state.record_error(LocationError::PermissionDenied));
        assert_eq!(state.status, TrackingStatus::Paused);
    }

    #[test]
    fn detector_follows_detection_mode() {
        let mut settings = TrackerSettings::default();
        settings.detection_mode = DetectionMode::Speed;
        let detector = SessionDetector::for_settings(&settings, Coordinate::new(0.0, 0.0));
        assert!(matches!(detector, SessionDetector::Speed(_)));
    }

    #[test]
    fn labels_cover_every_status() {
        assert_eq!(TrackingStatus::Paused.label(), "Paused");
        assert_eq!(TrackingStatus::Active.tone(), StatusTone::Primary);
        assert_eq!(TrackingStatus::GpsError.tone(), StatusTone::Destructive);
        assert!(TrackingStatus::GpsError.is_tracking());
    }
}
