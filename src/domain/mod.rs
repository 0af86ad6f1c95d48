//! Domain models - core value types and events
//!
//! This module contains the canonical data types used throughout the system:
//! - `Coordinate` - validated latitude/longitude
//! - `SafeZone` - caregiver-defined circular zone
//! - `Fix` / `PositionSample` - raw and classified position readings
//! - `GeofenceEvent` / `WanderingEvent` - alerts raised by the detectors
//! - error taxonomy for ingestion, registry and sinks

pub mod error;
pub mod events;
pub mod types;

pub use error::{CoordinateError, RegistryError, SinkDispatchError};
pub use events::{AlertEvent, GeofenceEvent, GeofenceKind, WanderingEvent};
pub use types::{
    Classification, Coordinate, Fix, PositionSample, SafeZone, ZoneId, ZoneIdSet, ZoneSpec,
};
