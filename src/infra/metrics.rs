//! Fix-processing and alert counters
//!
//! Counters are plain atomics updated from the ingestion path and the sink
//! workers. `report()` is the only reader that resets anything.
//!
//! All atomics use Relaxed ordering: these are statistics, never used to
//! coordinate between tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Fixes accepted and classified (monotonic)
    fixes_total: AtomicU64,
    /// Fixes since last report (reset on report)
    fixes_since_report: AtomicU64,
    /// Fixes dropped for out-of-range coordinates (monotonic)
    fixes_rejected: AtomicU64,
    /// Classified fixes that were inside a safe zone (monotonic)
    fixes_safe: AtomicU64,
    /// Sum of per-fix processing latencies (reset on report)
    latency_sum_us: AtomicU64,
    /// Max per-fix processing latency (reset on report)
    latency_max_us: AtomicU64,
    /// Per-fix processing latency histogram (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Zone entries (monotonic)
    geofence_entered: AtomicU64,
    /// Zone exits (monotonic)
    geofence_exited: AtomicU64,
    /// Wandering alerts raised (monotonic)
    wandering_total: AtomicU64,
    /// Sink dispatch failures (monotonic)
    sink_failures: AtomicU64,
    /// Alerts published by sink workers (monotonic)
    alerts_published: AtomicU64,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            fixes_total: AtomicU64::new(0),
            fixes_since_report: AtomicU64::new(0),
            fixes_rejected: AtomicU64::new(0),
            fixes_safe: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            geofence_entered: AtomicU64::new(0),
            geofence_exited: AtomicU64::new(0),
            wandering_total: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            alerts_published: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a classified fix with its processing latency (lock-free)
    #[inline]
    pub fn record_fix_processed(&self, latency_us: u64, is_safe: bool) {
        self.fixes_total.fetch_add(1, Ordering::Relaxed);
        self.fixes_since_report.fetch_add(1, Ordering::Relaxed);
        if is_safe {
            self.fixes_safe.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_fix_rejected(&self) {
        self.fixes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_geofence(&self, entered: bool) {
        if entered {
            self.geofence_entered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.geofence_exited.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_wandering(&self) {
        self.wandering_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert_published(&self) {
        self.alerts_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn fixes_total(&self) -> u64 {
        self.fixes_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fixes_rejected(&self) -> u64 {
        self.fixes_rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn wandering_total(&self) -> u64 {
        self.wandering_total.load(Ordering::Relaxed)
    }

    /// Generate a report and reset periodic counters
    ///
    /// Monotonic counters are loaded; periodic counters and the latency
    /// histogram are swapped to zero.
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *last = now;
            elapsed
        };

        let fixes_since = self.fixes_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let fixes_per_sec = if elapsed_secs > 0.0 { fixes_since as f64 / elapsed_secs } else { 0.0 };
        let avg_latency = if fixes_since > 0 { latency_sum / fixes_since } else { 0 };

        MetricsSummary {
            fixes_total: self.fixes_total.load(Ordering::Relaxed),
            fixes_rejected: self.fixes_rejected.load(Ordering::Relaxed),
            fixes_safe: self.fixes_safe.load(Ordering::Relaxed),
            fixes_per_sec,
            avg_process_latency_us: avg_latency,
            max_process_latency_us: latency_max,
            lat_buckets,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            geofence_entered: self.geofence_entered.load(Ordering::Relaxed),
            geofence_exited: self.geofence_exited.load(Ordering::Relaxed),
            wandering_total: self.wandering_total.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            alerts_published: self.alerts_published.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub fixes_total: u64,
    pub fixes_rejected: u64,
    pub fixes_safe: u64,
    pub fixes_per_sec: f64,
    pub avg_process_latency_us: u64,
    pub max_process_latency_us: u64,
    /// Per-fix latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub geofence_entered: u64,
    pub geofence_exited: u64,
    pub wandering_total: u64,
    pub sink_failures: u64,
    pub alerts_published: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            fixes_total = %self.fixes_total,
            fixes_rejected = %self.fixes_rejected,
            fixes_per_sec = format!("{:.2}", self.fixes_per_sec),
            avg_latency_us = %self.avg_process_latency_us,
            max_latency_us = %self.max_process_latency_us,
            p99_us = %self.lat_p99_us,
            entered = %self.geofence_entered,
            exited = %self.geofence_exited,
            wandering = %self.wandering_total,
            sink_failures = %self.sink_failures,
            "metrics"
        );
    }
}
