use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::{LocationError, LocationEvent, LocationSource, LocationWatch, WatchId};
use crate::models::{Coordinate, PositionSample};

#[derive(Default)]
struct ChannelState {
    next_watch: u64,
    active: Option<(WatchId, mpsc::UnboundedSender<LocationEvent>)>,
    last_position: Option<Coordinate>,
    watch_calls: usize,
    clear_calls: usize,
    unavailable: bool,
    watch_failure: Option<LocationError>,
}

/// In-process location source fed by the caller. Backs track replay and tests.
#[derive(Default)]
pub struct ChannelLocationSource {
    state: Mutex<ChannelState>,
}

impl ChannelLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        let source = Self::default();
        source.lock().unavailable = true;
        source
    }

    /// The next `watch_position` call fails with `err`.
    pub fn fail_next_watch(&self, err: LocationError) {
        self.lock().watch_failure = Some(err);
    }

    /// Delivers a sample to the active watch. Returns `false` when nobody is watching.
    pub fn push_sample(&self, sample: PositionSample) -> bool {
        let mut state = self.lock();
        state.last_position = Some(sample.coordinate);
        match &state.active {
            Some((_, tx)) => tx.send(LocationEvent::Sample(sample)).is_ok(),
            None => false,
        }
    }

    pub fn push_error(&self, err: LocationError) -> bool {
        match &self.lock().active {
            Some((_, tx)) => tx.send(LocationEvent::Error(err)).is_ok(),
            None => false,
        }
    }

    /// Drops the active watch's sender without a `clear_watch`, as when the
    /// platform ends the stream on its own.
    pub fn close_stream(&self) -> bool {
        self.lock().active.take().is_some()
    }

    pub fn is_watching(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn watch_calls(&self) -> usize {
        self.lock().watch_calls
    }

    pub fn clear_calls(&self) -> usize {
        self.lock().clear_calls
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocationSource for ChannelLocationSource {
    fn is_available(&self) -> bool {
        !self.lock().unavailable
    }

    fn watch_position(&self) -> Result<LocationWatch, LocationError> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(LocationError::Unsupported);
        }
        if let Some(err) = state.watch_failure.take() {
            return Err(err);
        }

        state.next_watch += 1;
        state.watch_calls += 1;
        let id = WatchId(state.next_watch);
        let (tx, rx) = mpsc::unbounded_channel();
        state.active = Some((id, tx));

        Ok(LocationWatch { id, events: rx })
    }

    fn clear_watch(&self, id: WatchId) {
        let mut state = self.lock();
        state.clear_calls += 1;
        if matches!(state.active, Some((active, _)) if active == id) {
            state.active = None;
        }
    }

    fn current_position(&self) -> Result<Coordinate, LocationError> {
        self.lock()
            .last_position
            .ok_or(LocationError::PositionUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn samples_reach_only_the_active_watch() {
        let source = ChannelLocationSource::new();
        let sample = PositionSample::new(Coordinate::new(1.0, 2.0), None, Utc::now());
        assert!(!source.push_sample(sample.clone()));

        let mut watch = source.watch_position().unwrap();
        assert!(source.push_sample(sample.clone()));
        assert_eq!(watch.events.try_recv().unwrap(), LocationEvent::Sample(sample));

        source.clear_watch(watch.id);
        assert!(!source.is_watching());
        assert_eq!(source.clear_calls(), 1);
        assert_eq!(source.current_position().unwrap(), Coordinate::new(1.0, 2.0));
    }

    #[test]
    fn closing_the_stream_ends_the_watch() {
        let source = ChannelLocationSource::new();
        let mut watch = source.watch_position().unwrap();

        assert!(source.close_stream());
        assert!(!source.close_stream());
        assert!(watch.events.try_recv().is_err());
        assert!(!source.is_watching());
        assert_eq!(source.clear_calls(), 0);
    }

    #[test]
    fn injected_watch_failure_is_one_shot() {
        let source = ChannelLocationSource::new();
        source.fail_next_watch(LocationError::PermissionDenied);
        assert_eq!(
            source.watch_position().err(),
            Some(LocationError::PermissionDenied)
        );
        assert!(source.watch_position().is_ok());
    }
}
