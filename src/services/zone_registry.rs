//! Caregiver-editable registry of safe zones
//!
//! Writers take an exclusive lock; `snapshot()` takes a shared lock and
//! copies the whole zone list, so an evaluation always sees either the
//! full pre-edit or the full post-edit set.

use crate::domain::error::RegistryError;
use crate::domain::types::{SafeZone, ZoneId, ZoneSpec};
use parking_lot::RwLock;
use tracing::info;

/// Thread-safe set of safe zones in insertion order
#[derive(Default)]
pub struct SafeZoneRegistry {
    zones: RwLock<Vec<SafeZone>>,
}

impl SafeZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an initial zone list, rejecting duplicate IDs
    pub fn with_zones(zones: impl IntoIterator<Item = SafeZone>) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for zone in zones {
            registry.add(zone)?;
        }
        Ok(registry)
    }

    pub fn add(&self, zone: SafeZone) -> Result<(), RegistryError> {
        let mut zones = self.zones.write();
        if zones.iter().any(|z| z.id() == zone.id()) {
            return Err(RegistryError::DuplicateZone(zone.id().clone()));
        }

        info!(
            zone_id = %zone.id(),
            name = %zone.name(),
            center = %zone.center(),
            radius_m = %zone.radius_m(),
            active = %zone.is_active(),
            "zone_added"
        );
        zones.push(zone);
        Ok(())
    }

    /// Validate caregiver input and add it under a freshly generated ID
    pub fn create(&self, spec: ZoneSpec) -> Result<ZoneId, RegistryError> {
        let id = ZoneId::generate();
        self.add(spec.into_zone(id.clone())?)?;
        Ok(id)
    }

    /// Replace the zone stored under `id`, keeping its ID and position
    pub fn update(&self, id: &ZoneId, new_zone: SafeZone) -> Result<(), RegistryError> {
        let mut zones = self.zones.write();
        let slot = zones
            .iter_mut()
            .find(|z| z.id() == id)
            .ok_or_else(|| RegistryError::ZoneNotFound(id.clone()))?;

        *slot = new_zone.with_id(id.clone());
        info!(
            zone_id = %id,
            name = %slot.name(),
            center = %slot.center(),
            radius_m = %slot.radius_m(),
            active = %slot.is_active(),
            "zone_updated"
        );
        Ok(())
    }

    pub fn remove(&self, id: &ZoneId) -> Result<SafeZone, RegistryError> {
        let mut zones = self.zones.write();
        let idx = zones
            .iter()
            .position(|z| z.id() == id)
            .ok_or_else(|| RegistryError::ZoneNotFound(id.clone()))?;

        let removed = zones.remove(idx);
        info!(zone_id = %id, name = %removed.name(), "zone_removed");
        Ok(removed)
    }

    pub fn set_active(&self, id: &ZoneId, active: bool) -> Result<(), RegistryError> {
        let mut zones = self.zones.write();
        let slot = zones
            .iter_mut()
            .find(|z| z.id() == id)
            .ok_or_else(|| RegistryError::ZoneNotFound(id.clone()))?;

        if slot.is_active() != active {
            *slot = slot.clone().with_active(active);
            info!(zone_id = %id, active = %active, "zone_active_changed");
        }
        Ok(())
    }

    /// Copy of the current zone set in stable insertion order
    pub fn snapshot(&self) -> Vec<SafeZone> {
        self.zones.read().clone()
    }

    pub fn get(&self, id: &ZoneId) -> Option<SafeZone> {
        self.zones.read().iter().find(|z| z.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.zones.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.read().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.zones.read().iter().filter(|z| z.is_active()).count()
    }
}
