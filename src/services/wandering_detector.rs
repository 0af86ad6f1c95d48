//! Wandering detection
//!
//! Raises one `WanderingEvent` per excursion once the person has been
//! outside every active safe zone for at least the configured threshold.
//! Re-entering any safe zone ends the excursion and re-arms detection.

use crate::domain::events::WanderingEvent;
use crate::domain::types::PositionSample;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

/// Default time outside all safe zones before an alert (30 minutes)
pub const DEFAULT_WANDERING_THRESHOLD_SECS: i64 = 30 * 60;

pub struct WanderingDetector {
    threshold: TimeDelta,
    excursion_start: Option<DateTime<Utc>>,
    raised: bool,
}

impl WanderingDetector {
    pub fn new(threshold: TimeDelta) -> Self {
        Self { threshold, excursion_start: None, raised: false }
    }

    /// Feed one classified sample
    pub fn observe(&mut self, sample: &PositionSample) -> Option<WanderingEvent> {
        if sample.is_safe {
            if let Some(start) = self.excursion_start.take() {
                debug!(
                    started = %start,
                    returned = %sample.timestamp,
                    raised = %self.raised,
                    "excursion_ended"
                );
            }
            self.raised = false;
            return None;
        }

        let start = *self.excursion_start.get_or_insert_with(|| {
            debug!(started = %sample.timestamp, "excursion_started");
            sample.timestamp
        });

        if self.raised {
            return None;
        }

        let elapsed = sample.timestamp - start;
        if elapsed < TimeDelta::zero() {
            warn!(start = %start, ts = %sample.timestamp, "wandering_sample_out_of_order");
            return None;
        }
        if elapsed < self.threshold {
            return None;
        }

        self.raised = true;
        info!(
            started = %start,
            elapsed_secs = %elapsed.num_seconds(),
            position = %sample.coordinate,
            "wandering_detected"
        );
        Some(WanderingEvent {
            timestamp: sample.timestamp,
            duration_outside: elapsed,
            last_known: sample.coordinate,
        })
    }

    /// Continue an excursion that began before a restart
    ///
    /// If the threshold had already been crossed by `last_seen`, the alert
    /// counts as raised and is not repeated.
    pub fn resume(&mut self, started: DateTime<Utc>, last_seen: DateTime<Utc>) {
        self.excursion_start = Some(started);
        self.raised = last_seen - started >= self.threshold;
        debug!(started = %started, raised = %self.raised, "excursion_resumed");
    }

    /// Start of the current excursion, if the person is outside
    pub fn excursion_started_at(&self) -> Option<DateTime<Utc>> {
        self.excursion_start
    }

    /// Whether the current excursion has already raised its event
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn threshold(&self) -> TimeDelta {
        self.threshold
    }
}

impl Default for WanderingDetector {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(DEFAULT_WANDERING_THRESHOLD_SECS))
    }
}
