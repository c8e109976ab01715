//! Assignment (employee ↔ device link) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::EntityId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: EntityId,
    pub device_id: EntityId,
    pub employee_id: EntityId,
    pub assigned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub return_observations: Option<String>,
}

impl Assignment {
    /// An assignment is active until the device is returned.
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignDevice {
    pub device_id: EntityId,
    pub employee_id: EntityId,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReturnDevice {
    pub return_observations: Option<String>,
}
