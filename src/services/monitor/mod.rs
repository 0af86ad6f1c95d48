//! Location ingestion and alert orchestration
//!
//! The Monitor processes one fix at a time, in a fixed order:
//! 1. snapshot the zone registry
//! 2. classify the position
//! 3. append the sample to history
//! 4. run transition detection
//! 5. run wandering detection
//! 6. dispatch resulting alerts
//! 7. update the tracked-person state
//!
//! History is written before any alert goes out, so every alert can be
//! traced back to the sample that produced it.

mod lifecycle;

pub use lifecycle::IngestionLoop;

use crate::domain::error::CoordinateError;
use crate::domain::events::{AlertEvent, GeofenceKind};
use crate::domain::types::{Classification, Coordinate, Fix, PositionSample};
use crate::infra::metrics::Metrics;
use crate::io::location_source::LocationSource;
use crate::services::dispatcher::AlertDispatcher;
use crate::services::history::LocationHistoryStore;
use crate::services::transition_detector::{TransitionDetector, DEFAULT_DEBOUNCE_SAMPLES};
use crate::services::wandering_detector::{WanderingDetector, DEFAULT_WANDERING_THRESHOLD_SECS};
use crate::services::zone_evaluator::classify;
use crate::services::zone_registry::SafeZoneRegistry;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Detection tunables
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub debounce_samples: u32,
    pub wandering_threshold: TimeDelta,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            debounce_samples: DEFAULT_DEBOUNCE_SAMPLES,
            wandering_threshold: TimeDelta::seconds(DEFAULT_WANDERING_THRESHOLD_SECS),
        }
    }
}

/// What the engine knows about the tracked person between fixes
///
/// Starts out unknown; only the ingestion path mutates it.
#[derive(Debug, Clone, Default)]
pub struct TrackedPersonState {
    last_classification: Option<Classification>,
    last_fix_at: Option<DateTime<Utc>>,
    last_safe_at: Option<DateTime<Utc>>,
    outside_since: Option<DateTime<Utc>>,
}

impl TrackedPersonState {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&mut self, sample: &PositionSample) {
        if sample.is_safe {
            self.last_safe_at = Some(sample.timestamp);
            self.outside_since = None;
        } else if self.outside_since.is_none() {
            self.outside_since = Some(sample.timestamp);
        }
        self.last_fix_at = Some(sample.timestamp);
        self.last_classification = Some(sample.classification());
    }

    /// Classification of the latest fix, `None` until the first one
    pub fn last_classification(&self) -> Option<&Classification> {
        self.last_classification.as_ref()
    }

    pub fn last_fix_at(&self) -> Option<DateTime<Utc>> {
        self.last_fix_at
    }

    /// When the person was last seen inside any safe zone
    pub fn last_safe_at(&self) -> Option<DateTime<Utc>> {
        self.last_safe_at
    }

    /// First fix of the current stretch outside every safe zone
    pub fn outside_since(&self) -> Option<DateTime<Utc>> {
        self.outside_since
    }

    pub fn is_safe(&self) -> Option<bool> {
        self.last_classification.as_ref().map(|c| c.is_safe)
    }
}

/// Result of processing one fix
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub sample: Arc<PositionSample>,
    pub events: Vec<AlertEvent>,
}

/// Geofencing engine for one tracked person
pub struct Monitor {
    /// Caregiver-edited zones, shared with the editing side
    registry: Arc<SafeZoneRegistry>,
    /// Classified sample log, shared with report readers
    history: Arc<LocationHistoryStore>,
    transitions: TransitionDetector,
    wandering: WanderingDetector,
    dispatcher: AlertDispatcher,
    state: TrackedPersonState,
    metrics: Arc<Metrics>,
}

impl Monitor {
    pub fn new(
        settings: &MonitorSettings,
        registry: Arc<SafeZoneRegistry>,
        history: Arc<LocationHistoryStore>,
        dispatcher: AlertDispatcher,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            history,
            transitions: TransitionDetector::new(settings.debounce_samples),
            wandering: WanderingDetector::new(settings.wandering_threshold),
            dispatcher,
            state: TrackedPersonState::new(),
            metrics,
        }
    }

    /// Resume from a previously saved person state
    ///
    /// Zone membership and any excursion in progress carry over, so the
    /// first fix after resuming is judged against the saved position.
    pub fn with_state(mut self, state: TrackedPersonState) -> Self {
        if let Some(last) = state.last_classification() {
            self.transitions.resume(last);
        }
        if let (Some(started), Some(last_seen)) = (state.outside_since(), state.last_fix_at()) {
            self.wandering.resume(started, last_seen);
        }
        self.state = state;
        self
    }

    /// Process a single position fix
    ///
    /// Out-of-range coordinates are rejected before classification and
    /// never reach history.
    pub fn on_fix(&mut self, fix: Fix) -> Result<FixOutcome, CoordinateError> {
        let process_start = Instant::now();

        let coordinate = match Coordinate::new(fix.lat, fix.lon) {
            Ok(c) => c,
            Err(e) => {
                warn!(lat = %fix.lat, lon = %fix.lon, ts = %fix.timestamp, error = %e, "fix_rejected");
                self.metrics.record_fix_rejected();
                return Err(e);
            }
        };

        let zones = self.registry.snapshot();
        let classification = classify(&coordinate, &zones);
        debug!(
            position = %coordinate,
            accuracy_m = ?fix.accuracy_m,
            is_safe = %classification.is_safe,
            zones = ?classification.containing,
            "fix_classified"
        );

        let sample = self.history.append(PositionSample::new(
            fix.timestamp,
            coordinate,
            classification.clone(),
        ));

        let mut events: Vec<AlertEvent> = self
            .transitions
            .observe(sample.timestamp, &zones, &classification)
            .into_iter()
            .map(AlertEvent::from)
            .collect();

        if let Some(wandering) = self.wandering.observe(&sample) {
            events.push(wandering.into());
        }

        for event in &events {
            match event {
                AlertEvent::Geofence(e) => {
                    self.metrics.record_geofence(e.kind == GeofenceKind::Entered)
                }
                AlertEvent::Wandering(_) => self.metrics.record_wandering(),
            }
            self.dispatcher.dispatch(event);
        }

        self.state.update(&sample);

        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_fix_processed(latency_us, sample.is_safe);

        Ok(FixOutcome { sample, events })
    }

    /// Consume fixes until the source is exhausted or shutdown is signalled
    pub async fn run<S: LocationSource>(
        &mut self,
        source: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(zones = %self.registry.len(), "ingestion_started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        info!("ingestion_shutdown");
                        break;
                    }
                }
                fix = source.next_fix() => {
                    match fix {
                        // Rejections are already logged and counted
                        Some(fix) => { let _ = self.on_fix(fix); }
                        None => {
                            info!("fix_source_exhausted");
                            break;
                        }
                    }
                }
            }
        }
    }

    pub fn state(&self) -> &TrackedPersonState {
        &self.state
    }

    pub fn registry(&self) -> &Arc<SafeZoneRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<LocationHistoryStore> {
        &self.history
    }

    /// Start of the current excursion outside all safe zones
    pub fn excursion_started_at(&self) -> Option<DateTime<Utc>> {
        self.wandering.excursion_started_at()
    }
}
