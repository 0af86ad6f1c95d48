//! Services - the geofencing engine
//!
//! - `geo` - great-circle distance
//! - `zone_registry` - caregiver-edited safe zones with snapshot reads
//! - `zone_evaluator` - point-in-zone classification
//! - `history` - bounded most-recent-first sample log
//! - `transition_detector` - per-zone entry/exit with debounce
//! - `wandering_detector` - prolonged time outside all zones
//! - `dispatcher` - alert fan-out to sinks
//! - `monitor` - per-fix orchestration and ingestion lifecycle

pub mod dispatcher;
pub mod geo;
pub mod history;
pub mod monitor;
pub mod transition_detector;
pub mod wandering_detector;
pub mod zone_evaluator;
pub mod zone_registry;

pub use dispatcher::{AlertDispatcher, AlertSink, LogSink};
pub use history::{Excursion, HistoryWindow, LocationHistoryStore};
pub use monitor::{FixOutcome, IngestionLoop, Monitor, MonitorSettings, TrackedPersonState};
pub use zone_registry::SafeZoneRegistry;
