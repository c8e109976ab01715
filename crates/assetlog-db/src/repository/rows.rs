//! DB-side row structs and their conversions to domain models.
//!
//! Rows never carry the record key itself; reads project it back in via
//! `meta::id(id) AS record_id`.

use assetlog_core::models::assignment::Assignment;
use assetlog_core::models::device::{Device, DeviceStatus, DeviceType};
use assetlog_core::models::employee::Employee;
use assetlog_core::models::event::{Action, Actor, EntityType, Event};
use assetlog_core::snapshot::Snapshot;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DbError;

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::Decode(format!("timestamp out of range: {millis}")))
}

/// Rows that carry an optimistic-concurrency version.
pub(crate) trait Versioned {
    fn version(&self) -> i64;
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DeviceRow {
    #[serde(default, skip_serializing)]
    pub record_id: i64,
    pub serial_number: String,
    pub device_type: String,
    pub brand: String,
    pub model: String,
    pub hostname: Option<String>,
    pub inventory_code: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub purchase_date: Option<String>,
    pub registered_at: i64,
    pub version: i64,
}

impl DeviceRow {
    pub fn from_device(device: &Device, version: i64) -> Self {
        Self {
            record_id: device.id,
            serial_number: device.serial_number.clone(),
            device_type: device.device_type.as_str().to_string(),
            brand: device.brand.clone(),
            model: device.model.clone(),
            hostname: device.hostname.clone(),
            inventory_code: device.inventory_code.clone(),
            location: device.location.clone(),
            status: device.status.as_str().to_string(),
            purchase_date: device.purchase_date.map(|d| d.format("%Y-%m-%d").to_string()),
            registered_at: to_millis(device.registered_at),
            version,
        }
    }

    pub fn into_device(self) -> Result<Device, DbError> {
        let device_type = DeviceType::parse(&self.device_type)
            .ok_or_else(|| DbError::Decode(format!("unknown device type: {}", self.device_type)))?;
        let status = DeviceStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown device status: {}", self.status)))?;
        let purchase_date = self
            .purchase_date
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|e| DbError::Decode(format!("invalid purchase date {raw}: {e}")))
            })
            .transpose()?;
        Ok(Device {
            id: self.record_id,
            serial_number: self.serial_number,
            device_type,
            brand: self.brand,
            model: self.model,
            hostname: self.hostname,
            inventory_code: self.inventory_code,
            location: self.location,
            status,
            purchase_date,
            registered_at: from_millis(self.registered_at)?,
        })
    }
}

impl Versioned for DeviceRow {
    fn version(&self) -> i64 {
        self.version
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EmployeeRow {
    #[serde(default, skip_serializing)]
    pub record_id: i64,
    pub full_name: String,
    pub email: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub version: i64,
}

impl EmployeeRow {
    pub fn from_employee(employee: &Employee, version: i64) -> Self {
        Self {
            record_id: employee.id,
            full_name: employee.full_name.clone(),
            email: employee.email.clone(),
            department: employee.department.clone(),
            position: employee.position.clone(),
            company: employee.company.clone(),
            location: employee.location.clone(),
            is_active: employee.is_active,
            version,
        }
    }

    pub fn into_employee(self) -> Employee {
        Employee {
            id: self.record_id,
            full_name: self.full_name,
            email: self.email,
            department: self.department,
            position: self.position,
            company: self.company,
            location: self.location,
            is_active: self.is_active,
        }
    }
}

impl Versioned for EmployeeRow {
    fn version(&self) -> i64 {
        self.version
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssignmentRow {
    #[serde(default, skip_serializing)]
    pub record_id: i64,
    pub device_id: i64,
    pub employee_id: i64,
    pub assigned_at: i64,
    pub returned_at: Option<i64>,
    pub notes: Option<String>,
    pub return_observations: Option<String>,
    pub version: i64,
}

impl AssignmentRow {
    pub fn from_assignment(assignment: &Assignment, version: i64) -> Self {
        Self {
            record_id: assignment.id,
            device_id: assignment.device_id,
            employee_id: assignment.employee_id,
            assigned_at: to_millis(assignment.assigned_at),
            returned_at: assignment.returned_at.map(to_millis),
            notes: assignment.notes.clone(),
            return_observations: assignment.return_observations.clone(),
            version,
        }
    }

    pub fn into_assignment(self) -> Result<Assignment, DbError> {
        Ok(Assignment {
            id: self.record_id,
            device_id: self.device_id,
            employee_id: self.employee_id,
            assigned_at: from_millis(self.assigned_at)?,
            returned_at: self.returned_at.map(from_millis).transpose()?,
            notes: self.notes,
            return_observations: self.return_observations,
        })
    }
}

impl Versioned for AssignmentRow {
    fn version(&self) -> i64 {
        self.version
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EventRow {
    pub seq: i64,
    pub timestamp: i64,
    pub actor: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub snapshot_before: Option<String>,
    pub snapshot_after: Option<String>,
    pub details: Option<String>,
    pub reverted_at: Option<i64>,
    pub reverted_by: Option<String>,
    pub reverts_event_id: Option<i64>,
}

impl EventRow {
    pub fn from_event(event: &Event) -> Result<Self, DbError> {
        let encode = |snapshot: &Option<Snapshot>| {
            snapshot
                .as_ref()
                .map(|s| s.encode().map_err(|e| DbError::Decode(e.to_string())))
                .transpose()
        };
        Ok(Self {
            seq: event.id,
            timestamp: to_millis(event.timestamp),
            actor: event.actor.clone().into(),
            action: event.action.as_str().to_string(),
            entity_type: event.entity_type.as_str().to_string(),
            entity_id: event.entity_id,
            snapshot_before: encode(&event.snapshot_before)?,
            snapshot_after: encode(&event.snapshot_after)?,
            details: event.details.clone(),
            reverted_at: event.reverted_at.map(to_millis),
            reverted_by: event.reverted_by.clone().and_then(Into::into),
            reverts_event_id: event.reverts_event_id,
        })
    }

    pub fn into_event(self) -> Result<Event, DbError> {
        let decode = |raw: Option<String>| {
            raw.map(|r| Snapshot::decode(&r).map_err(|e| DbError::Decode(e.to_string())))
                .transpose()
        };
        let action: Action = self
            .action
            .parse()
            .map_err(|_| DbError::Decode(format!("unknown action: {}", self.action)))?;
        let entity_type: EntityType = self
            .entity_type
            .parse()
            .map_err(|_| DbError::Decode(format!("unknown entity type: {}", self.entity_type)))?;
        let reverted_at = self.reverted_at.map(from_millis).transpose()?;
        // A system revert stores no name; the marker itself is `reverted_at`.
        let reverted_by = reverted_at.map(|_| Actor::from(self.reverted_by));
        Ok(Event {
            id: self.seq,
            timestamp: from_millis(self.timestamp)?,
            actor: Actor::from(self.actor),
            action,
            entity_type,
            entity_id: self.entity_id,
            snapshot_before: decode(self.snapshot_before)?,
            snapshot_after: decode(self.snapshot_after)?,
            details: self.details,
            reverted_at,
            reverted_by,
            reverts_event_id: self.reverts_event_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CounterRow {
    pub last_id: i64,
}
