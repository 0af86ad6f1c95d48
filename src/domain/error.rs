//! Error taxonomy for the monitoring engine
//!
//! None of these errors is fatal: a bad fix is dropped, registry misuse is
//! returned to the caller, and sink failures are logged by the dispatcher.

use crate::domain::types::ZoneId;
use thiserror::Error;

/// A latitude/longitude pair outside the valid range
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} outside [-90, 90]")]
    InvalidLatitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    InvalidLongitude(f64),
}

/// Safe-zone registry misuse
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("zone {0} already exists")]
    DuplicateZone(ZoneId),
    #[error("zone {0} not found")]
    ZoneNotFound(ZoneId),
    #[error("radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),
    #[error("invalid zone center: {0}")]
    InvalidCenter(#[from] CoordinateError),
}

/// Failure of a single alert sink
#[derive(Debug, Error)]
pub enum SinkDispatchError {
    /// Sink queue is full, the alert was dropped
    #[error("sink queue full")]
    QueueFull,
    /// Sink worker has gone away
    #[error("sink closed")]
    Closed,
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),
}
