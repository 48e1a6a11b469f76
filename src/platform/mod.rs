//! Boundary contracts with the device: location stream, display wake-lock and
//! feedback (tone/vibration). The tracking core only talks to these traits.

pub mod channel;
pub mod notifier;
pub mod simulated;
pub mod wake_lock;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{Coordinate, PositionSample};

pub use channel::ChannelLocationSource;
pub use notifier::{LogNotifier, Notifier, RecordingNotifier};
pub use wake_lock::{CountingWakeLock, WakeLock, WakeLockGuard, WakeLockToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a position fix")]
    Timeout,
    #[error("location services are not supported on this device")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Sample(PositionSample),
    Error(LocationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// An open subscription. Events stop once the source clears the watch.
pub struct LocationWatch {
    pub id: WatchId,
    pub events: mpsc::UnboundedReceiver<LocationEvent>,
}

pub trait LocationSource: Send + Sync {
    fn is_available(&self) -> bool;

    fn watch_position(&self) -> Result<LocationWatch, LocationError>;

    fn clear_watch(&self, id: WatchId);

    /// One-shot fix. May block while the device acquires a position.
    fn current_position(&self) -> Result<Coordinate, LocationError>;
}
