//! Per-zone entry/exit detection with sample-count debounce
//!
//! Each zone runs an independent Inside/Outside state machine. A change
//! is only confirmed once the new membership has been observed for
//! `debounce_samples` consecutive samples; a single contrary sample resets
//! the count. The first classification only establishes the baseline.

use crate::domain::events::{GeofenceEvent, GeofenceKind};
use crate::domain::types::{Classification, SafeZone, ZoneId};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Default debounce: every change is confirmed immediately
pub const DEFAULT_DEBOUNCE_SAMPLES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Outside,
    Inside,
}

impl ZoneState {
    #[inline]
    fn from_membership(inside: bool) -> Self {
        if inside {
            ZoneState::Inside
        } else {
            ZoneState::Outside
        }
    }
}

#[derive(Debug, Clone)]
struct ZoneTrack {
    confirmed: ZoneState,
    /// Consecutive samples disagreeing with `confirmed`
    pending: u32,
}

impl ZoneTrack {
    fn new(state: ZoneState) -> Self {
        Self { confirmed: state, pending: 0 }
    }

    /// Feed one observation, returning the new state if it was confirmed
    fn observe(&mut self, observed: ZoneState, debounce_samples: u32) -> Option<ZoneState> {
        if observed == self.confirmed {
            self.pending = 0;
            return None;
        }

        self.pending += 1;
        if self.pending >= debounce_samples {
            self.confirmed = observed;
            self.pending = 0;
            Some(observed)
        } else {
            None
        }
    }
}

/// Emits `GeofenceEvent`s when zone membership changes
pub struct TransitionDetector {
    debounce_samples: u32,
    zones: FxHashMap<ZoneId, ZoneTrack>,
    baselined: bool,
    /// Membership carried over from a saved state, consumed by the next sample
    resumed: Option<Classification>,
}

impl TransitionDetector {
    /// Create a detector; a debounce below 1 is treated as 1
    pub fn new(debounce_samples: u32) -> Self {
        Self {
            debounce_samples: debounce_samples.max(1),
            zones: FxHashMap::default(),
            baselined: false,
            resumed: None,
        }
    }

    /// Seed zone membership from the last known classification
    ///
    /// The next sample is compared against this membership instead of
    /// establishing a fresh baseline, so leaving a zone right after a
    /// restart still raises `Exited`.
    pub fn resume(&mut self, last: &Classification) {
        self.zones.clear();
        self.baselined = false;
        self.resumed = Some(last.clone());
    }

    /// Process one classification against the snapshot it was computed from
    ///
    /// Events come out in snapshot order and carry the sample timestamp.
    pub fn observe(
        &mut self,
        timestamp: DateTime<Utc>,
        zones: &[SafeZone],
        classification: &Classification,
    ) -> Vec<GeofenceEvent> {
        let mut events = Vec::new();

        for zone in zones {
            let observed = ZoneState::from_membership(classification.contains(zone.id()));

            if !self.baselined || !self.zones.contains_key(zone.id()) {
                let Some(last) = self.resumed.as_ref() else {
                    // First sight of this zone: baseline only
                    debug!(zone_id = %zone.id(), state = ?observed, "zone_baseline");
                    self.zones.insert(zone.id().clone(), ZoneTrack::new(observed));
                    continue;
                };
                let previous = ZoneState::from_membership(last.contains(zone.id()));
                debug!(zone_id = %zone.id(), state = ?previous, "zone_resumed");
                self.zones.insert(zone.id().clone(), ZoneTrack::new(previous));
            }

            let Some(track) = self.zones.get_mut(zone.id()) else {
                continue;
            };
            if let Some(state) = track.observe(observed, self.debounce_samples) {
                let kind = match state {
                    ZoneState::Inside => GeofenceKind::Entered,
                    ZoneState::Outside => GeofenceKind::Exited,
                };
                info!(
                    zone_id = %zone.id(),
                    zone = %zone.name(),
                    kind = %kind.as_str(),
                    ts = %timestamp,
                    "geofence_transition"
                );
                events.push(GeofenceEvent { timestamp, zone_id: zone.id().clone(), kind });
            }
        }

        // Zones removed from the registry stop being tracked
        if self.zones.len() > zones.len() {
            self.zones.retain(|id, _| zones.iter().any(|z| z.id() == id));
        }
        self.baselined = true;
        self.resumed = None;
        events
    }

    /// Confirmed state of a zone, if it has been observed
    pub fn zone_state(&self, id: &ZoneId) -> Option<ZoneState> {
        self.zones.get(id).map(|t| t.confirmed)
    }

    pub fn is_baselined(&self) -> bool {
        self.baselined
    }

    pub fn debounce_samples(&self) -> u32 {
        self.debounce_samples
    }
}

impl Default for TransitionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_SAMPLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Coordinate;
    use crate::services::zone_evaluator::classify;
    use chrono::{TimeDelta, TimeZone};

    fn ts(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap() + TimeDelta::seconds(sec)
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn zone(id: &str, lat: f64, lon: f64, radius_m: f64) -> SafeZone {
        SafeZone::new(ZoneId::from(id), id, coord(lat, lon), radius_m).unwrap()
    }

    const INSIDE: (f64, f64) = (0.0, 0.0);
    const OUTSIDE: (f64, f64) = (0.0, 0.01);

    /// Feed a sequence of points and collect all events
    fn run(
        detector: &mut TransitionDetector,
        zones: &[SafeZone],
        points: &[(f64, f64)],
    ) -> Vec<GeofenceEvent> {
        points
            .iter()
            .enumerate()
            .flat_map(|(i, (lat, lon))| {
                let c = classify(&coord(*lat, *lon), zones);
                detector.observe(ts(i as i64), zones, &c)
            })
            .collect()
    }

    #[test]
    fn test_first_sample_is_baseline_only() {
        let zones = [zone("home", 0.0, 0.0, 100.0)];
        let mut detector = TransitionDetector::default();

        assert!(run(&mut detector, &zones, &[INSIDE]).is_empty());
        assert!(detector.is_baselined());
        assert_eq!(detector.zone_state(&ZoneId::from("home")), Some(ZoneState::Inside));
    }

    #[test]
    fn test_exit_then_enter() {
        let zones = [zone("home", 0.0, 0.0, 100.0)];
        let mut detector = TransitionDetector::default();

        let events = run(&mut detector, &zones, &[INSIDE, OUTSIDE, OUTSIDE, INSIDE]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, GeofenceKind::Exited);
        assert_eq!(events[0].timestamp, ts(1));
        assert_eq!(events[1].kind, GeofenceKind::Entered);
        assert_eq!(events[1].timestamp, ts(3));
    }

    #[test]
    fn test_debounce_suppresses_jitter() {
        let zones = [zone("home", 0.0, 0.0, 100.0)];
        let mut detector = TransitionDetector::new(3);

        // Two-sample excursions never reach the debounce count
        let events =
            run(&mut detector, &zones, &[INSIDE, OUTSIDE, OUTSIDE, INSIDE, OUTSIDE, INSIDE]);
        assert!(events.is_empty());
        assert_eq!(detector.zone_state(&ZoneId::from("home")), Some(ZoneState::Inside));
    }

    #[test]
    fn test_debounce_confirms_on_nth_sample() {
        let zones = [zone("home", 0.0, 0.0, 100.0)];
        let mut detector = TransitionDetector::new(3);

        let events = run(&mut detector, &zones, &[INSIDE, OUTSIDE, OUTSIDE, OUTSIDE, OUTSIDE]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GeofenceKind::Exited);
        assert_eq!(events[0].timestamp, ts(3));
    }

    #[test]
    fn test_zero_debounce_treated_as_one() {
        assert_eq!(TransitionDetector::new(0).debounce_samples(), 1);
    }

    #[test]
    fn test_simultaneous_transitions_in_snapshot_order() {
        let zones = [zone("park", 0.0, 0.0, 300.0), zone("home", 0.0, 0.0, 100.0)];
        let mut detector = TransitionDetector::default();

        let events = run(&mut detector, &zones, &[INSIDE, OUTSIDE]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].zone_id, ZoneId::from("park"));
        assert_eq!(events[1].zone_id, ZoneId::from("home"));
        assert!(events.iter().all(|e| e.kind == GeofenceKind::Exited && e.timestamp == ts(1)));
    }

    #[test]
    fn test_new_zone_baselines_without_event() {
        let home = zone("home", 0.0, 0.0, 100.0);
        let park = zone("park", 0.0, 0.0, 300.0);
        let mut detector = TransitionDetector::default();

        run(&mut detector, std::slice::from_ref(&home), &[INSIDE]);
        let c = classify(&coord(0.0, 0.0), &[home.clone(), park.clone()]);
        let events = detector.observe(ts(10), &[home, park], &c);
        assert!(events.is_empty());
        assert_eq!(detector.zone_state(&ZoneId::from("park")), Some(ZoneState::Inside));
    }

    #[test]
    fn test_resume_compares_against_saved_membership() {
        let zones = [zone("home", 0.0, 0.0, 100.0)];
        let saved = classify(&coord(INSIDE.0, INSIDE.1), &zones);
        let mut detector = TransitionDetector::default();
        detector.resume(&saved);

        let events = run(&mut detector, &zones, &[OUTSIDE, OUTSIDE]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GeofenceKind::Exited);
        assert_eq!(events[0].timestamp, ts(0));

        // Later zones go back to silent baselining
        let park = zone("park", 0.0, 0.01, 100.0);
        let both = [zones[0].clone(), park];
        let c = classify(&coord(OUTSIDE.0, OUTSIDE.1), &both);
        assert!(detector.observe(ts(5), &both, &c).is_empty());
    }

    #[test]
    fn test_removed_zone_forgotten() {
        let home = zone("home", 0.0, 0.0, 100.0);
        let mut detector = TransitionDetector::default();
        run(&mut detector, std::slice::from_ref(&home), &[INSIDE]);

        let events = detector.observe(ts(5), &[], &Classification::default());
        assert!(events.is_empty());
        assert_eq!(detector.zone_state(&ZoneId::from("home")), None);
    }

    #[test]
    fn test_no_active_zones_never_fires() {
        let zones = [zone("home", 0.0, 0.0, 100.0).with_active(false)];
        let mut detector = TransitionDetector::default();
        let events = run(&mut detector, &zones, &[INSIDE, OUTSIDE, INSIDE, OUTSIDE]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_alternation_invariant() {
        let zones = [zone("home", 0.0, 0.0, 100.0), zone("park", 0.0, 0.004, 200.0)];
        for debounce in 1..=3 {
            let mut detector = TransitionDetector::new(debounce);
            // Deterministic pseudo-random walk across both zones
            let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
            let points: Vec<(f64, f64)> = (0..400)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 7;
                    seed ^= seed << 17;
                    (0.0, (seed % 80) as f64 * 0.0001 - 0.002)
                })
                .collect();

            let events = run(&mut detector, &zones, &points);
            for id in ["home", "park"] {
                let kinds: Vec<_> =
                    events.iter().filter(|e| e.zone_id.as_str() == id).map(|e| e.kind).collect();
                for pair in kinds.windows(2) {
                    assert_ne!(pair[0], pair[1], "zone {id} repeated {:?}", pair[0]);
                }
            }
        }
    }
}
