//! Shared types for the safe-zone monitor

use crate::domain::error::{CoordinateError, RegistryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

/// Newtype wrapper for safe-zone IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    /// Generate a new time-sortable zone ID (UUIDv7)
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Zone IDs containing a point, in registry snapshot order
pub type ZoneIdSet = SmallVec<[ZoneId; 4]>;

/// Latitude/longitude in decimal degrees
///
/// Only constructible through [`Coordinate::new`], so every value is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        // NaN fails both range checks
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::InvalidLatitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::InvalidLongitude(lon));
        }
        Ok(Self { lat, lon })
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Caregiver input for a new or replacement zone
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneSpec {
    pub name: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,
}

impl ZoneSpec {
    pub fn new(name: &str, center_lat: f64, center_lon: f64, radius_m: f64) -> Self {
        Self { name: name.to_string(), center_lat, center_lon, radius_m }
    }

    /// Validate and build an active zone with the given ID
    pub fn into_zone(self, id: ZoneId) -> Result<SafeZone, RegistryError> {
        let center = Coordinate::new(self.center_lat, self.center_lon)?;
        SafeZone::new(id, &self.name, center, self.radius_m)
    }
}

/// Circular safe zone
///
/// Center and radius never change after construction; edits replace the
/// whole zone in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafeZone {
    id: ZoneId,
    name: String,
    center: Coordinate,
    radius_m: f64,
    active: bool,
}

impl SafeZone {
    pub fn new(
        id: ZoneId,
        name: &str,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<Self, RegistryError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(RegistryError::InvalidRadius(radius_m));
        }
        Ok(Self { id, name: name.to_string(), center, radius_m, active: true })
    }

    /// Copy of this zone with a different active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Copy of this zone under a different ID
    pub(crate) fn with_id(mut self, id: ZoneId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> &ZoneId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Raw position fix as delivered by the location provider
///
/// Coordinates are unchecked here; validation happens at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy in meters, carried but not used for classification
    #[serde(default, alias = "accuracy", skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl Fix {
    pub fn new(lat: f64, lon: f64, timestamp: DateTime<Utc>) -> Self {
        Self { lat, lon, timestamp, accuracy_m: None }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }
}

/// Zone membership of a single point
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub is_safe: bool,
    pub containing: ZoneIdSet,
}

impl Classification {
    pub fn from_containing(containing: ZoneIdSet) -> Self {
        Self { is_safe: !containing.is_empty(), containing }
    }

    #[inline]
    pub fn contains(&self, id: &ZoneId) -> bool {
        self.containing.iter().any(|z| z == id)
    }
}

/// Classified fix retained in the location history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSample {
    pub timestamp: DateTime<Utc>,
    pub coordinate: Coordinate,
    pub is_safe: bool,
    pub containing_zone_ids: ZoneIdSet,
}

impl PositionSample {
    pub fn new(
        timestamp: DateTime<Utc>,
        coordinate: Coordinate,
        classification: Classification,
    ) -> Self {
        Self {
            timestamp,
            coordinate,
            is_safe: classification.is_safe,
            containing_zone_ids: classification.containing,
        }
    }

    pub fn classification(&self) -> Classification {
        Classification { is_safe: self.is_safe, containing: self.containing_zone_ids.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert_eq!(Coordinate::new(90.5, 0.0), Err(CoordinateError::InvalidLatitude(90.5)));
        assert_eq!(Coordinate::new(0.0, -181.0), Err(CoordinateError::InvalidLongitude(-181.0)));
    }

    #[test]
    fn test_coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_zone_rejects_bad_radius() {
        let center = Coordinate::new(0.0, 0.0).unwrap();
        assert_eq!(
            SafeZone::new(ZoneId::from("z"), "Home", center, 0.0),
            Err(RegistryError::InvalidRadius(0.0))
        );
        assert!(SafeZone::new(ZoneId::from("z"), "Home", center, -5.0).is_err());
        assert!(SafeZone::new(ZoneId::from("z"), "Home", center, f64::INFINITY).is_err());
    }

    #[test]
    fn test_zone_spec_into_zone() {
        let zone = ZoneSpec::new("Park", 51.5, -0.12, 250.0).into_zone(ZoneId::from("p")).unwrap();
        assert_eq!(zone.name(), "Park");
        assert_eq!(zone.radius_m(), 250.0);
        assert!(zone.is_active());

        let bad = ZoneSpec::new("Nowhere", 95.0, 0.0, 10.0).into_zone(ZoneId::from("n"));
        assert!(matches!(bad, Err(RegistryError::InvalidCenter(_))));
    }

    #[test]
    fn test_generated_zone_ids_unique() {
        let a = ZoneId::generate();
        let b = ZoneId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_fix_json_wire_format() {
        let fix: Fix =
            serde_json::from_str(r#"{"lat":1.5,"lon":2.5,"ts":"2026-01-01T08:00:00Z"}"#).unwrap();
        assert_eq!(fix.lat, 1.5);
        assert_eq!(fix.accuracy_m, None);

        let json = serde_json::to_string(&fix.with_accuracy(12.0)).unwrap();
        assert!(json.contains("\"ts\":\"2026-01-01T08:00:00Z\""));
        assert!(json.contains("\"accuracy_m\":12.0"));
    }

    #[test]
    fn test_classification_is_safe_follows_membership() {
        assert!(!Classification::from_containing(ZoneIdSet::new()).is_safe);

        let c = Classification::from_containing(smallvec![ZoneId::from("home")]);
        assert!(c.is_safe);
        assert!(c.contains(&ZoneId::from("home")));
        assert!(!c.contains(&ZoneId::from("park")));
    }
}
