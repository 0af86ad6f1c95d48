//! SafeZone monitor library
//!
//! Geofencing and wandering detection for a single tracked person.
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
