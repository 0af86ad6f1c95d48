//! Zone membership for a single point

use crate::domain::types::{Classification, Coordinate, SafeZone, ZoneIdSet};
use crate::services::geo::distance_meters;

/// Classify a point against a zone snapshot
///
/// A zone contains the point when it is active and the point lies within
/// its radius (boundary inclusive). Containing IDs keep snapshot order.
pub fn classify(point: &Coordinate, zones: &[SafeZone]) -> Classification {
    let containing: ZoneIdSet = zones
        .iter()
        .filter(|z| z.is_active() && distance_meters(point, &z.center()) <= z.radius_m())
        .map(|z| z.id().clone())
        .collect();
    Classification::from_containing(containing)
}
