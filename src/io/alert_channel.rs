//! Typed channel for outbound alerts
//!
//! `AlertSender` is the non-blocking sink handed to the dispatcher; each I/O
//! worker (alert log, MQTT) owns the receiving end of its own channel.
//! Bounded, so a stalled worker drops alerts instead of growing memory.

use crate::domain::error::SinkDispatchError;
use crate::domain::events::{AlertEvent, GeofenceEvent, WanderingEvent};
use crate::services::dispatcher::AlertSink;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Messages consumed by the alert workers
#[derive(Debug, Clone, PartialEq)]
pub enum AlertMessage {
    Geofence(GeofencePayload),
    Wandering(WanderingPayload),
}

impl AlertMessage {
    pub fn from_event(event: &AlertEvent, site: &str) -> Self {
        match event {
            AlertEvent::Geofence(e) => Self::Geofence(GeofencePayload::new(e, site)),
            AlertEvent::Wandering(e) => Self::Wandering(WanderingPayload::new(e, site)),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Geofence(p) => serde_json::to_string(p),
            Self::Wandering(p) => serde_json::to_string(p),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geofence(_) => "geofence",
            Self::Wandering(_) => "wandering",
        }
    }
}

/// Zone entry/exit on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofencePayload {
    pub site: String,
    /// Event timestamp (epoch ms)
    pub ts: i64,
    /// "entered" or "exited"
    pub t: &'static str,
    pub zone: String,
}

impl GeofencePayload {
    fn new(event: &GeofenceEvent, site: &str) -> Self {
        Self {
            site: site.to_string(),
            ts: event.timestamp.timestamp_millis(),
            t: event.kind.as_str(),
            zone: event.zone_id.to_string(),
        }
    }
}

/// Wandering alert on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WanderingPayload {
    pub site: String,
    /// Event timestamp (epoch ms)
    pub ts: i64,
    /// Time outside all safe zones when raised
    pub outside_secs: i64,
    pub lat: f64,
    pub lon: f64,
}

impl WanderingPayload {
    fn new(event: &WanderingEvent, site: &str) -> Self {
        Self {
            site: site.to_string(),
            ts: event.timestamp.timestamp_millis(),
            outside_secs: event.duration_outside.num_seconds(),
            lat: event.last_known.lat(),
            lon: event.last_known.lon(),
        }
    }
}

/// Sender half, registered with the dispatcher
///
/// Clone to share. Never waits: a full queue is reported as `QueueFull`.
#[derive(Clone)]
pub struct AlertSender {
    name: String,
    tx: mpsc::Sender<AlertMessage>,
    site_id: String,
}

impl AlertSender {
    pub fn new(name: &str, tx: mpsc::Sender<AlertMessage>, site_id: String) -> Self {
        Self { name: name.to_string(), tx, site_id }
    }
}

impl AlertSink for AlertSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&self, event: &AlertEvent) -> Result<(), SinkDispatchError> {
        let msg = AlertMessage::from_event(event, &self.site_id);
        match self.tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SinkDispatchError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(SinkDispatchError::Closed),
        }
    }
}

/// Create a named alert channel pair
pub fn create_alert_channel(
    name: &str,
    buffer_size: usize,
    site_id: String,
) -> (AlertSender, mpsc::Receiver<AlertMessage>) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (AlertSender::new(name, tx, site_id), rx)
}
