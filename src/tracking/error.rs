use thiserror::Error;

use crate::platform::LocationError;

/// Reasons a tracking session could not start.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("location services are not available on this device")]
    LocationUnavailable,
    #[error("select a company before starting a route")]
    NoCompanySelected,
    #[error("company {0} not found")]
    CompanyNotFound(String),
    #[error("company {0} has no registered base location")]
    MissingBaseLocation(String),
    #[error("tracking is already active")]
    AlreadyActive,
    #[error("could not subscribe to location updates: {0}")]
    Location(#[from] LocationError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
