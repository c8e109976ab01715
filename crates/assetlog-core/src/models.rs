//! Domain models for the inventory audit engine.
//!
//! Inventory entities (devices, employees, assignments) are owned by the
//! surrounding CRUD layer; the engine only reads and restores them. Events
//! are the engine's own append-only records.

pub mod assignment;
pub mod device;
pub mod employee;
pub mod event;

use chrono::{DateTime, Utc};

/// Truncate a timestamp to the canonical (millisecond) precision used for
/// storage and snapshot comparison.
pub fn canonical_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
