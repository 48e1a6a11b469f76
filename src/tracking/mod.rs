//! Tracking session: stop detection fed by a location stream, and the
//! controller that owns its lifecycle.

pub mod controller;
pub mod counter;
pub mod detector;
mod error;
mod loop_worker;
pub mod speed_dwell;
pub mod state;

pub use controller::{DayHandoff, TrackingController, TrackingSnapshot};
pub use counter::DeliveryCounter;
pub use detector::{DetectionParams, Gate, StopDetector};
pub use error::TrackingError;
pub use speed_dwell::SpeedDwellDetector;
pub use state::{TrackingState, TrackingStatus};
