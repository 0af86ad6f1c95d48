//! End-to-end geofencing scenarios driven by synthetic fixes

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use safezone_monitor::domain::{
    AlertEvent, Coordinate, Fix, GeofenceKind, PositionSample, SafeZone, SinkDispatchError,
    ZoneId, ZoneSpec,
};
use safezone_monitor::infra::Metrics;
use safezone_monitor::io::create_fix_channel;
use safezone_monitor::services::zone_evaluator::classify;
use safezone_monitor::services::{
    AlertDispatcher, AlertSink, IngestionLoop, LocationHistoryStore, Monitor, MonitorSettings,
    SafeZoneRegistry,
};
use std::sync::Arc;

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<AlertEvent>>>,
}

impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn dispatch(&self, event: &AlertEvent) -> Result<(), SinkDispatchError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

struct Harness {
    monitor: Monitor,
    sink: RecordingSink,
}

fn harness(zones: Vec<SafeZone>, history_capacity: usize, threshold: TimeDelta) -> Harness {
    let metrics = Arc::new(Metrics::new());
    let registry = Arc::new(SafeZoneRegistry::with_zones(zones).unwrap());
    let history = Arc::new(LocationHistoryStore::new(history_capacity));
    let sink = RecordingSink::default();
    let mut dispatcher = AlertDispatcher::with_metrics(metrics.clone());
    dispatcher.register(sink.clone());
    let settings = MonitorSettings { wandering_threshold: threshold, ..Default::default() };
    Harness { monitor: Monitor::new(&settings, registry, history, dispatcher, metrics), sink }
}

fn home() -> SafeZone {
    SafeZone::new(ZoneId::from("home"), "Home", Coordinate::new(0.0, 0.0).unwrap(), 100.0).unwrap()
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

fn at(minutes: i64) -> DateTime<Utc> {
    t0() + TimeDelta::minutes(minutes)
}

fn wandering_count(events: &[AlertEvent]) -> usize {
    events.iter().filter(|e| matches!(e, AlertEvent::Wandering(_))).count()
}

#[test]
fn scenario_a_first_fix_then_exit() {
    let mut h = harness(vec![home()], 1000, TimeDelta::minutes(30));

    let first = h.monitor.on_fix(Fix::new(0.0, 0.0, at(0))).unwrap();
    assert!(first.sample.is_safe);
    assert!(first.events.is_empty());

    let second = h.monitor.on_fix(Fix::new(0.0, 0.01, at(1))).unwrap();
    assert!(!second.sample.is_safe);
    assert_eq!(second.events.len(), 1);
    match &second.events[0] {
        AlertEvent::Geofence(e) => {
            assert_eq!(e.zone_id, ZoneId::from("home"));
            assert_eq!(e.kind, GeofenceKind::Exited);
            assert_eq!(e.timestamp, at(1));
        }
        other => panic!("expected exit, got {:?}", other),
    }
}

#[test]
fn scenario_b_single_wandering_event_per_excursion() {
    let mut h = harness(vec![home()], 1000, TimeDelta::minutes(30));
    h.monitor.on_fix(Fix::new(0.0, 0.0, at(-1))).unwrap();
    h.monitor.on_fix(Fix::new(0.0, 0.01, at(0))).unwrap();

    let mut raised_at = Vec::new();
    for minute in (5..=35).step_by(5) {
        let outcome = h.monitor.on_fix(Fix::new(0.0, 0.01, at(minute))).unwrap();
        if wandering_count(&outcome.events) > 0 {
            raised_at.push(minute);
        }
    }
    assert_eq!(raised_at, vec![30]);

    // Still outside: nothing new
    h.monitor.on_fix(Fix::new(0.0, 0.01, at(90))).unwrap();
    assert_eq!(wandering_count(&h.sink.events.lock()), 1);

    // Re-enter, leave again, stay out past the threshold
    h.monitor.on_fix(Fix::new(0.0, 0.0, at(100))).unwrap();
    h.monitor.on_fix(Fix::new(0.0, 0.01, at(110))).unwrap();
    h.monitor.on_fix(Fix::new(0.0, 0.01, at(140))).unwrap();
    assert_eq!(wandering_count(&h.sink.events.lock()), 2);
}

#[test]
fn scenario_c_no_active_zones() {
    let mut h = harness(vec![home().with_active(false)], 1000, TimeDelta::hours(24));

    for (i, lon) in [0.0, 0.01, 0.0, 0.0005, 0.02].into_iter().enumerate() {
        let outcome = h.monitor.on_fix(Fix::new(0.0, lon, at(i as i64))).unwrap();
        assert!(!outcome.sample.is_safe);
        assert!(outcome.sample.containing_zone_ids.is_empty());
    }
    assert!(h.sink.events.lock().is_empty());
}

#[test]
fn scenario_d_history_capacity_three() {
    let store = LocationHistoryStore::new(3);
    for i in 1..=5 {
        store.append(PositionSample::new(
            at(i),
            Coordinate::new(0.0, 0.0).unwrap(),
            Default::default(),
        ));
    }

    let timestamps: Vec<_> = store.all().iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![at(5), at(4), at(3)]);
}

#[test]
fn invalid_fix_never_reaches_history() {
    let mut h = harness(vec![home()], 10, TimeDelta::minutes(30));
    assert!(h.monitor.on_fix(Fix::new(-95.0, 0.0, at(0))).is_err());
    assert!(h.monitor.on_fix(Fix::new(0.0, 181.0, at(1))).is_err());
    assert!(h.monitor.on_fix(Fix::new(f64::NAN, 0.0, at(2))).is_err());
    assert!(h.monitor.history().is_empty());
}

#[test]
fn caregiver_edits_visible_to_next_fix() {
    let mut h = harness(vec![], 100, TimeDelta::minutes(30));
    let outcome = h.monitor.on_fix(Fix::new(10.0, 10.0, at(0))).unwrap();
    assert!(!outcome.sample.is_safe);

    let park = h.monitor.registry().create(ZoneSpec::new("Park", 10.0, 10.0, 200.0)).unwrap();
    let outcome = h.monitor.on_fix(Fix::new(10.0, 10.0, at(1))).unwrap();
    assert!(outcome.sample.is_safe);
    assert_eq!(outcome.sample.containing_zone_ids.as_slice(), &[park.clone()]);

    h.monitor.registry().remove(&park).unwrap();
    let outcome = h.monitor.on_fix(Fix::new(10.0, 10.0, at(2))).unwrap();
    assert!(!outcome.sample.is_safe);
    assert!(outcome.events.is_empty());
}

#[test]
fn property_classify_matches_brute_force() {
    let zones: Vec<SafeZone> = (0..6)
        .map(|i| {
            let center = Coordinate::new(i as f64 * 0.002, -(i as f64) * 0.001).unwrap();
            SafeZone::new(ZoneId::from(format!("z{i}").as_str()), "zone", center, 50.0 + i as f64 * 40.0)
                .unwrap()
                .with_active(i % 3 != 0)
        })
        .collect();

    for step in 0..400 {
        let lat = (step % 20) as f64 * 0.0006;
        let lon = -((step / 20) as f64) * 0.0004;
        let point = Coordinate::new(lat, lon).unwrap();
        let classification = classify(&point, &zones);

        let expected = zones.iter().any(|z| {
            z.is_active()
                && safezone_monitor::services::geo::distance_meters(&point, &z.center()) <= z.radius_m()
        });
        assert_eq!(classification.is_safe, expected, "point {point}");
    }
}

#[test]
fn property_transitions_alternate_per_zone() {
    let mut h = harness(vec![home()], 1000, TimeDelta::hours(24));
    let mut state = 0x9E37_79B9_7F4A_7C15_u64;

    for minute in 0..500 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let lon = if state % 3 == 0 { 0.0003 } else { 0.002 };
        h.monitor.on_fix(Fix::new(0.0, lon, at(minute))).unwrap();
    }

    let kinds: Vec<GeofenceKind> = h
        .sink
        .events
        .lock()
        .iter()
        .filter_map(|e| match e {
            AlertEvent::Geofence(g) => Some(g.kind),
            AlertEvent::Wandering(_) => None,
        })
        .collect();
    assert!(!kinds.is_empty());
    assert!(kinds.windows(2).all(|w| w[0] != w[1]));
}

#[test]
fn property_snapshot_idempotent() {
    let registry = SafeZoneRegistry::with_zones(vec![home()]).unwrap();
    registry.create(ZoneSpec::new("Shop", 0.01, 0.01, 60.0)).unwrap();
    assert_eq!(registry.snapshot(), registry.snapshot());
}

#[tokio::test]
async fn ingestion_loop_replays_channel() {
    let h = harness(vec![home()], 100, TimeDelta::minutes(10));
    let sink = h.sink.clone();
    let mut ingestion = IngestionLoop::new(h.monitor);

    let (tx, source) = create_fix_channel(16);
    assert!(ingestion.start(source));

    tx.send(Fix::new(0.0, 0.0, at(0))).await.unwrap();
    for minute in 1..=12 {
        tx.send(Fix::new(0.0, 0.01, at(minute))).await.unwrap();
    }
    tx.send(Fix::new(0.0, 0.0, at(13))).await.unwrap();
    drop(tx);
    ingestion.join().await;

    let monitor = ingestion.into_monitor().unwrap();
    assert_eq!(monitor.history().len(), 14);
    assert_eq!(wandering_count(&sink.events.lock()), 1);

    let excursions = monitor.history().excursions(at(0));
    assert_eq!(excursions.len(), 1);
    assert_eq!(excursions[0].sample_count, 12);
    assert_eq!(excursions[0].returned_at, Some(at(13)));
}
