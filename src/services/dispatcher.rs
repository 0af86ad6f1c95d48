//! Alert fan-out to notification sinks
//!
//! Dispatch is synchronous and never fails as a whole: each sink is called
//! in registration order and a failing sink is logged and skipped. Sinks
//! that do I/O must hand the event off (see `io::alert_channel`) rather
//! than block the ingestion loop.

use crate::domain::error::SinkDispatchError;
use crate::domain::events::AlertEvent;
use crate::infra::metrics::Metrics;
use std::sync::Arc;
use tracing::{info, warn};

/// Destination for alert events
pub trait AlertSink: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    fn dispatch(&self, event: &AlertEvent) -> Result<(), SinkDispatchError>;
}

/// Forwards every event to all registered sinks
#[derive(Default)]
pub struct AlertDispatcher {
    sinks: Vec<Box<dyn AlertSink>>,
    metrics: Option<Arc<Metrics>>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher that records sink failures
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self { sinks: Vec::new(), metrics: Some(metrics) }
    }

    pub fn register(&mut self, sink: impl AlertSink + 'static) {
        info!(sink = %sink.name(), "alert_sink_registered");
        self.sinks.push(Box::new(sink));
    }

    /// Deliver an event to every sink, returning how many accepted it
    pub fn dispatch(&self, event: &AlertEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.dispatch(event) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        sink = %sink.name(),
                        alert = %event.as_str(),
                        error = %e,
                        "sink_dispatch_failed"
                    );
                    if let Some(ref metrics) = self.metrics {
                        metrics.record_sink_failure();
                    }
                }
            }
        }
        delivered
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

/// Logs every alert; the in-process stand-in for an on-screen banner
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn dispatch(&self, event: &AlertEvent) -> Result<(), SinkDispatchError> {
        match event {
            AlertEvent::Geofence(e) => info!(
                zone_id = %e.zone_id,
                kind = %e.kind.as_str(),
                ts = %e.timestamp,
                "alert_geofence"
            ),
            AlertEvent::Wandering(e) => warn!(
                duration_secs = %e.duration_outside.num_seconds(),
                position = %e.last_known,
                ts = %e.timestamp,
                "alert_wandering"
            ),
        }
        Ok(())
    }
}
