//! Snapshot codec.
//!
//! A [`Snapshot`] is a type-tagged, point-in-time copy of an entity's
//! persisted fields. Producers capture one before and one after every
//! mutation; reversal strategies compare them against live state and apply
//! them back.
//!
//! Snapshots are serialized as JSON objects carrying an `entity_type`
//! discriminator, so a stored snapshot can always be decoded into the right
//! variant without consulting the event that holds it.

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};
use crate::models::assignment::Assignment;
use crate::models::canonical_timestamp;
use crate::models::device::{Device, DeviceStatus};
use crate::models::employee::Employee;
use crate::models::event::{EntityId, EntityType};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum Snapshot {
    Device(Device),
    Employee(Employee),
    Assignment(AssignmentSnapshot),
}

/// The assignment aggregate: the link record (absent before an ASSIGN)
/// together with the status of the device it governs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignmentSnapshot {
    pub link: Option<Assignment>,
    pub device_id: EntityId,
    pub device_status: DeviceStatus,
}

impl AssignmentSnapshot {
    pub fn capture(link: Option<&Assignment>, device: &Device) -> Self {
        Self {
            link: link.map(normalize_assignment),
            device_id: device.id,
            device_status: device.status,
        }
    }
}

impl Snapshot {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Device(_) => EntityType::Device,
            Self::Employee(_) => EntityType::Employee,
            Self::Assignment(_) => EntityType::Assignment,
        }
    }

    /// Identifier of the captured entity, if the snapshot names one.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::Device(device) => Some(device.id),
            Self::Employee(employee) => Some(employee.id),
            Self::Assignment(aggregate) => aggregate.link.as_ref().map(|link| link.id),
        }
    }

    /// Copy with every timestamp truncated to canonical precision.
    pub fn normalized(&self) -> Self {
        match self {
            Self::Device(device) => Self::Device(normalize_device(device)),
            Self::Employee(employee) => Self::Employee(employee.clone()),
            Self::Assignment(aggregate) => Self::Assignment(AssignmentSnapshot {
                link: aggregate.link.as_ref().map(normalize_assignment),
                device_id: aggregate.device_id,
                device_status: aggregate.device_status,
            }),
        }
    }

    /// Exact field equality after timestamp normalization.
    pub fn matches(&self, other: &Snapshot) -> bool {
        self.normalized() == other.normalized()
    }

    pub fn as_assignment(&self) -> AuditResult<&AssignmentSnapshot> {
        match self {
            Self::Assignment(aggregate) => Ok(aggregate),
            other => Err(AuditError::SnapshotMismatch {
                expected: EntityType::Assignment,
                found: other.entity_type(),
            }),
        }
    }

    pub fn encode(&self) -> AuditResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AuditError::Internal(format!("snapshot encoding failed: {e}")))
    }

    pub fn decode(raw: &str) -> AuditResult<Self> {
        serde_json::from_str(raw).map_err(|e| AuditError::Store(format!("corrupted snapshot: {e}")))
    }
}

fn normalize_device(device: &Device) -> Device {
    Device {
        registered_at: canonical_timestamp(device.registered_at),
        ..device.clone()
    }
}

fn normalize_assignment(link: &Assignment) -> Assignment {
    Assignment {
        assigned_at: canonical_timestamp(link.assigned_at),
        returned_at: link.returned_at.map(canonical_timestamp),
        ..link.clone()
    }
}

/// An entity whose persisted state can be captured into and restored from a
/// [`Snapshot`].
///
/// `apply(capture(e))` leaves `e` unchanged.
pub trait Tracked: Clone + Send + Sync + 'static {
    const ENTITY_TYPE: EntityType;

    fn entity_id(&self) -> EntityId;

    fn capture(&self) -> Snapshot;

    /// Reconstruct an entity from a snapshot of the same type.
    fn restore(snapshot: &Snapshot) -> AuditResult<Self>;

    /// Overwrite this entity's persisted fields with the snapshot's values.
    fn apply(&mut self, snapshot: &Snapshot) -> AuditResult<()> {
        let restored = Self::restore(snapshot)?;
        if restored.entity_id() != self.entity_id() {
            return Err(AuditError::validation(format!(
                "snapshot of {} {} cannot be applied to {} {}",
                Self::ENTITY_TYPE,
                restored.entity_id(),
                Self::ENTITY_TYPE,
                self.entity_id()
            )));
        }
        *self = restored;
        Ok(())
    }
}

impl Tracked for Device {
    const ENTITY_TYPE: EntityType = EntityType::Device;

    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn capture(&self) -> Snapshot {
        Snapshot::Device(normalize_device(self))
    }

    fn restore(snapshot: &Snapshot) -> AuditResult<Self> {
        match snapshot {
            Snapshot::Device(device) => Ok(normalize_device(device)),
            other => Err(AuditError::SnapshotMismatch {
                expected: EntityType::Device,
                found: other.entity_type(),
            }),
        }
    }
}

impl Tracked for Employee {
    const ENTITY_TYPE: EntityType = EntityType::Employee;

    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn capture(&self) -> Snapshot {
        Snapshot::Employee(self.clone())
    }

    fn restore(snapshot: &Snapshot) -> AuditResult<Self> {
        match snapshot {
            Snapshot::Employee(employee) => Ok(employee.clone()),
            other => Err(AuditError::SnapshotMismatch {
                expected: EntityType::Employee,
                found: other.entity_type(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::DeviceType;
    use chrono::{Duration, TimeZone, Utc};

    fn laptop() -> Device {
        Device {
            id: 7,
            serial_number: "SN-0007".into(),
            device_type: DeviceType::Laptop,
            brand: "Lenovo".into(),
            model: "T14".into(),
            hostname: Some("lt-0007".into()),
            inventory_code: Some("INV-LAP-007".into()),
            location: Some("Callao".into()),
            status: DeviceStatus::Available,
            purchase_date: None,
            registered_at: Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap(),
        }
    }

    #[test]
    fn apply_of_own_capture_is_a_no_op() {
        let device = laptop();
        let mut target = normalize_device(&device);
        let before = target.clone();
        target.apply(&device.capture()).unwrap();
        assert_eq!(target, before);
    }

    #[test]
    fn apply_restores_previous_values() {
        let original = laptop();
        let snapshot = original.capture();
        let mut edited = original.clone();
        edited.hostname = None;
        edited.location = Some("Lima".into());
        edited.apply(&snapshot).unwrap();
        assert_eq!(edited.hostname.as_deref(), Some("lt-0007"));
        assert_eq!(edited.location.as_deref(), Some("Callao"));
    }

    #[test]
    fn apply_rejects_foreign_entity_type() {
        let mut device = laptop();
        let employee = Snapshot::Employee(Employee {
            id: 7,
            full_name: "Luis Paz".into(),
            email: "luis@example.com".into(),
            department: None,
            position: None,
            company: None,
            location: None,
            is_active: true,
        });
        assert!(matches!(
            device.apply(&employee),
            Err(AuditError::SnapshotMismatch {
                expected: EntityType::Device,
                found: EntityType::Employee
            })
        ));
    }

    #[test]
    fn apply_rejects_other_identifier() {
        let mut device = laptop();
        let mut other = laptop();
        other.id = 8;
        assert!(device.apply(&other.capture()).is_err());
    }

    #[test]
    fn sub_millisecond_drift_is_not_a_change() {
        let device = laptop();
        let mut drifted = device.clone();
        drifted.registered_at += Duration::nanoseconds(300);
        assert!(Snapshot::Device(device.clone()).matches(&Snapshot::Device(drifted)));

        let mut moved = device.clone();
        moved.registered_at += Duration::milliseconds(5);
        assert!(!Snapshot::Device(device).matches(&Snapshot::Device(moved)));
    }

    #[test]
    fn encoded_snapshot_carries_its_entity_type() {
        let encoded = laptop().capture().encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["entity_type"], "device");
        assert_eq!(value["serial_number"], "SN-0007");

        let decoded = Snapshot::decode(&encoded).unwrap();
        assert_eq!(decoded, laptop().capture());
    }

    #[test]
    fn assignment_snapshot_names_its_link() {
        let device = laptop();
        let link = Assignment {
            id: 3,
            device_id: device.id,
            employee_id: 11,
            assigned_at: Utc::now(),
            returned_at: None,
            notes: None,
            return_observations: None,
        };
        let before = Snapshot::Assignment(AssignmentSnapshot::capture(None, &device));
        let after = Snapshot::Assignment(AssignmentSnapshot::capture(Some(&link), &device));
        assert_eq!(before.entity_id(), None);
        assert_eq!(after.entity_id(), Some(3));
        assert_eq!(after.entity_type(), EntityType::Assignment);
        assert!(after.as_assignment().is_ok());
        assert!(device.capture().as_assignment().is_err());
    }

    #[test]
    fn corrupted_snapshot_is_a_store_error() {
        assert!(matches!(
            Snapshot::decode("{\"entity_type\":\"printer\"}"),
            Err(AuditError::Store(_))
        ));
    }
}
