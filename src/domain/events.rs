//! Alert events produced by the detectors

use crate::domain::types::{Coordinate, ZoneId};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Direction of a zone membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceKind {
    Entered,
    Exited,
}

impl GeofenceKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceKind::Entered => "entered",
            GeofenceKind::Exited => "exited",
        }
    }
}

/// Person entered or left a safe zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceEvent {
    /// Timestamp of the sample that confirmed the transition
    pub timestamp: DateTime<Utc>,
    pub zone_id: ZoneId,
    pub kind: GeofenceKind,
}

/// Person has been outside every active zone for longer than the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WanderingEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration_outside: TimeDelta,
    pub last_known: Coordinate,
}

fn serialize_secs<S: serde::Serializer>(d: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

/// Anything the dispatcher can fan out to sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertEvent {
    Geofence(GeofenceEvent),
    Wandering(WanderingEvent),
}

impl AlertEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AlertEvent::Geofence(e) => e.timestamp,
            AlertEvent::Wandering(e) => e.timestamp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEvent::Geofence(e) => e.kind.as_str(),
            AlertEvent::Wandering(_) => "wandering",
        }
    }
}

impl From<GeofenceEvent> for AlertEvent {
    fn from(event: GeofenceEvent) -> Self {
        AlertEvent::Geofence(event)
    }
}

impl From<WanderingEvent> for AlertEvent {
    fn from(event: WanderingEvent) -> Self {
        AlertEvent::Wandering(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_event_kind_str() {
        let ts = Utc::now();
        let entered: AlertEvent = GeofenceEvent {
            timestamp: ts,
            zone_id: ZoneId::from("home"),
            kind: GeofenceKind::Entered,
        }
        .into();
        assert_eq!(entered.as_str(), "entered");
        assert_eq!(entered.timestamp(), ts);

        let wandering: AlertEvent = WanderingEvent {
            timestamp: ts,
            duration_outside: TimeDelta::minutes(31),
            last_known: Coordinate::new(1.0, 2.0).unwrap(),
        }
        .into();
        assert_eq!(wandering.as_str(), "wandering");
    }

    #[test]
    fn test_wandering_serializes_duration_as_seconds() {
        let event = AlertEvent::Wandering(WanderingEvent {
            timestamp: Utc::now(),
            duration_outside: TimeDelta::minutes(30),
            last_known: Coordinate::new(1.0, 2.0).unwrap(),
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "wandering");
        assert_eq!(json["duration_outside"], 1800);
        assert_eq!(json["last_known"]["lat"], 1.0);
    }
}
