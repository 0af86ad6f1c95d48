//! Bounded location history
//!
//! Most-recent-first log of classified samples. Capacity is enforced by
//! FIFO eviction of the oldest sample; anything older than the retained
//! window is gone for good.

use crate::domain::types::PositionSample;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Default number of retained samples
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Capacity-bounded, thread-safe history of position samples
///
/// One writer (the ingestion loop) and any number of readers. Samples are
/// shared behind `Arc`, so a reader holds either a whole sample or none.
pub struct LocationHistoryStore {
    capacity: usize,
    samples: RwLock<VecDeque<Arc<PositionSample>>>,
}

impl LocationHistoryStore {
    /// Create a store retaining at most `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, samples: RwLock::new(VecDeque::with_capacity(capacity)) }
    }

    /// Insert a sample at the head, evicting the oldest when full
    pub fn append(&self, sample: PositionSample) -> Arc<PositionSample> {
        let sample = Arc::new(sample);
        let mut samples = self.samples.write();
        samples.push_front(sample.clone());
        if samples.len() > self.capacity {
            if let Some(evicted) = samples.pop_back() {
                trace!(ts = %evicted.timestamp, "history_evicted");
            }
        }
        sample
    }

    /// Samples with `timestamp >= since`, most recent first
    pub fn query(&self, since: DateTime<Utc>) -> HistoryWindow {
        HistoryWindow { samples: self.retained(), since: Some(since) }
    }

    /// Every retained sample, most recent first
    pub fn all(&self) -> HistoryWindow {
        HistoryWindow { samples: self.retained(), since: None }
    }

    pub fn latest(&self) -> Option<Arc<PositionSample>> {
        self.samples.read().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximal runs of unsafe samples at or after `since`, oldest first
    pub fn excursions(&self, since: DateTime<Utc>) -> Vec<Excursion> {
        let retained = self.retained();
        let mut out = Vec::new();
        let mut current: Option<Excursion> = None;

        for sample in retained.iter().rev().filter(|s| s.timestamp >= since) {
            if sample.is_safe {
                if let Some(mut exc) = current.take() {
                    exc.returned_at = Some(sample.timestamp);
                    out.push(exc);
                }
            } else if let Some(exc) = current.as_mut() {
                exc.last_seen_at = sample.timestamp;
                exc.sample_count += 1;
            } else {
                current = Some(Excursion {
                    started_at: sample.timestamp,
                    last_seen_at: sample.timestamp,
                    returned_at: None,
                    sample_count: 1,
                });
            }
        }
        out.extend(current);
        out
    }

    fn retained(&self) -> Arc<[Arc<PositionSample>]> {
        self.samples.read().iter().cloned().collect()
    }
}

impl Default for LocationHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Point-in-time view over the retained samples
///
/// Filtering is lazy and the window can be iterated any number of times.
#[derive(Clone)]
pub struct HistoryWindow {
    samples: Arc<[Arc<PositionSample>]>,
    since: Option<DateTime<Utc>>,
}

impl HistoryWindow {
    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> + '_ {
        let since = self.since;
        self.samples
            .iter()
            .map(|s| s.as_ref())
            .filter(move |s| since.map_or(true, |since| s.timestamp >= since))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn to_vec(&self) -> Vec<PositionSample> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a HistoryWindow {
    type Item = &'a PositionSample;
    type IntoIter = Box<dyn Iterator<Item = &'a PositionSample> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// A maximal run of consecutive unsafe samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Excursion {
    pub started_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// First safe sample after the run, `None` while still outside
    pub returned_at: Option<DateTime<Utc>>,
    pub sample_count: usize,
}

impl Excursion {
    pub fn duration(&self) -> TimeDelta {
        self.returned_at.unwrap_or(self.last_seen_at) - self.started_at
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}
