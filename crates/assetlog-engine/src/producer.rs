//! Producer adapter.
//!
//! Every inventory mutation goes through [`record_event`] inside the same
//! transaction as the mutation itself. If the event cannot be appended the
//! error propagates, the transaction is dropped and the mutation never
//! becomes visible.
//!
//! [`Recorder`] is the CRUD surface built on top of it: each operation
//! captures the before-state, mutates, captures the after-state and records
//! the event, all in one unit of work.

use std::sync::Arc;

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::assignment::{AssignDevice, Assignment, ReturnDevice};
use assetlog_core::models::canonical_timestamp;
use assetlog_core::models::device::{CreateDevice, Device, DeviceStatus, UpdateDevice};
use assetlog_core::models::employee::{CreateEmployee, Employee, UpdateEmployee};
use assetlog_core::models::event::{Action, Actor, CreateEvent, EntityId, EntityType, EventId};
use assetlog_core::repository::{InventoryStore, InventoryTx};
use assetlog_core::snapshot::{AssignmentSnapshot, Snapshot, Tracked};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::clock::{Clock, SystemClock};

/// What a producer reports about one mutation.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub actor: Actor,
    pub action: Action,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub before: Option<Snapshot>,
    pub after: Option<Snapshot>,
    pub details: Option<String>,
}

/// Append the event describing a mutation staged in `tx`.
///
/// REVERT events are refused: only the orchestrator synthesizes them.
pub async fn record_event<T: InventoryTx>(
    tx: &mut T,
    timestamp: DateTime<Utc>,
    record: EventRecord,
) -> AuditResult<EventId> {
    if record.action == Action::Revert {
        return Err(AuditError::validation(
            "REVERT events are recorded by the revert orchestrator only",
        ));
    }
    let event = tx
        .append_event(CreateEvent {
            timestamp,
            actor: record.actor,
            action: record.action,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            snapshot_before: record.before,
            snapshot_after: record.after,
            details: record.details,
            reverts_event_id: None,
        })
        .await?;
    Ok(event.id)
}

/// A mutated value together with the event that records it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<V> {
    pub value: V,
    pub event_id: EventId,
}

fn required(field: &str, value: &str) -> AuditResult<()> {
    if value.trim().is_empty() {
        return Err(AuditError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Audited CRUD operations over the inventory.
pub struct Recorder<S: InventoryStore> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: InventoryStore> Recorder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Read only once the transaction is open, so event order and
    /// timestamps agree under contention.
    fn now(&self) -> DateTime<Utc> {
        canonical_timestamp(self.clock.now())
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    pub async fn create_device(
        &self,
        actor: Actor,
        input: CreateDevice,
    ) -> AuditResult<Recorded<Device>> {
        required("serial_number", &input.serial_number)?;
        required("brand", &input.brand)?;
        required("model", &input.model)?;

        let mut tx = self.store.begin().await?;
        let now = self.now();
        if let Some(existing) = tx.device_by_serial(&input.serial_number).await? {
            return Err(AuditError::conflict(format!(
                "serial number {} is already registered to device {}",
                input.serial_number, existing.id
            )));
        }

        let device = Device {
            id: tx.allocate_id(EntityType::Device).await?,
            serial_number: input.serial_number,
            device_type: input.device_type,
            brand: input.brand,
            model: input.model,
            hostname: input.hostname,
            inventory_code: input.inventory_code,
            location: input.location,
            status: DeviceStatus::Available,
            purchase_date: input.purchase_date,
            registered_at: now,
        };
        tx.put_device(device.clone()).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Create,
                entity_type: EntityType::Device,
                entity_id: device.id,
                before: None,
                after: Some(device.capture()),
                details: Some(format!(
                    "Created {} {} ({})",
                    device.device_type.as_str(),
                    device.serial_number,
                    device.brand
                )),
            },
        )
        .await?;
        tx.commit().await?;

        info!(device_id = device.id, event_id, "Device created");
        Ok(Recorded {
            value: device,
            event_id,
        })
    }

    pub async fn update_device(
        &self,
        actor: Actor,
        id: EntityId,
        input: UpdateDevice,
    ) -> AuditResult<Recorded<Device>> {
        let mut tx = self.store.begin().await?;
        let now = self.now();
        let mut device = tx
            .device(id)
            .await?
            .ok_or_else(|| AuditError::not_found("device", id))?;
        let before = device.capture();

        if let Some(status) = input.status {
            if status == DeviceStatus::Assigned && device.status != DeviceStatus::Assigned {
                return Err(AuditError::validation(
                    "a device becomes assigned through an assignment",
                ));
            }
            if device.status == DeviceStatus::Assigned && status != DeviceStatus::Assigned {
                return Err(AuditError::conflict(format!(
                    "device {id} is assigned; return it before changing its status"
                )));
            }
            device.status = status;
        }
        if let Some(serial_number) = input.serial_number {
            required("serial_number", &serial_number)?;
            if let Some(holder) = tx.device_by_serial(&serial_number).await? {
                if holder.id != id {
                    return Err(AuditError::conflict(format!(
                        "serial number {serial_number} is already registered to device {}",
                        holder.id
                    )));
                }
            }
            device.serial_number = serial_number;
        }
        if let Some(brand) = input.brand {
            device.brand = brand;
        }
        if let Some(model) = input.model {
            device.model = model;
        }
        if let Some(hostname) = input.hostname {
            device.hostname = hostname;
        }
        if let Some(inventory_code) = input.inventory_code {
            device.inventory_code = inventory_code;
        }
        if let Some(location) = input.location {
            device.location = location;
        }

        tx.put_device(device.clone()).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Update,
                entity_type: EntityType::Device,
                entity_id: id,
                before: Some(before),
                after: Some(device.capture()),
                details: Some(format!("Updated device {}", device.serial_number)),
            },
        )
        .await?;
        tx.commit().await?;

        info!(device_id = id, event_id, "Device updated");
        Ok(Recorded {
            value: device,
            event_id,
        })
    }

    pub async fn delete_device(&self, actor: Actor, id: EntityId) -> AuditResult<Recorded<Device>> {
        let mut tx = self.store.begin().await?;
        let now = self.now();
        let device = tx
            .device(id)
            .await?
            .ok_or_else(|| AuditError::not_found("device", id))?;
        let dependents = tx.assignments_for_device(id).await?.len();
        if dependents > 0 {
            return Err(AuditError::HasDependents {
                entity_type: EntityType::Device,
                entity_id: id,
                dependents,
            });
        }

        tx.delete_device(id).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Delete,
                entity_type: EntityType::Device,
                entity_id: id,
                before: Some(device.capture()),
                after: None,
                details: Some(format!("Deleted device {}", device.serial_number)),
            },
        )
        .await?;
        tx.commit().await?;

        info!(device_id = id, event_id, "Device deleted");
        Ok(Recorded {
            value: device,
            event_id,
        })
    }

    // -----------------------------------------------------------------------
    // Employees
    // -----------------------------------------------------------------------

    pub async fn create_employee(
        &self,
        actor: Actor,
        input: CreateEmployee,
    ) -> AuditResult<Recorded<Employee>> {
        required("full_name", &input.full_name)?;
        required("email", &input.email)?;

        let mut tx = self.store.begin().await?;
        let now = self.now();
        if let Some(existing) = tx.employee_by_email(&input.email).await? {
            return Err(AuditError::conflict(format!(
                "email {} is already registered to employee {}",
                input.email, existing.id
            )));
        }

        let employee = Employee {
            id: tx.allocate_id(EntityType::Employee).await?,
            full_name: input.full_name,
            email: input.email,
            department: input.department,
            position: input.position,
            company: input.company,
            location: input.location,
            is_active: true,
        };
        tx.put_employee(employee.clone()).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Create,
                entity_type: EntityType::Employee,
                entity_id: employee.id,
                before: None,
                after: Some(employee.capture()),
                details: Some(format!("Created employee {}", employee.full_name)),
            },
        )
        .await?;
        tx.commit().await?;

        info!(employee_id = employee.id, event_id, "Employee created");
        Ok(Recorded {
            value: employee,
            event_id,
        })
    }

    pub async fn update_employee(
        &self,
        actor: Actor,
        id: EntityId,
        input: UpdateEmployee,
    ) -> AuditResult<Recorded<Employee>> {
        let mut tx = self.store.begin().await?;
        let now = self.now();
        let mut employee = tx
            .employee(id)
            .await?
            .ok_or_else(|| AuditError::not_found("employee", id))?;
        let before = employee.capture();

        if let Some(email) = input.email {
            required("email", &email)?;
            if let Some(holder) = tx.employee_by_email(&email).await? {
                if holder.id != id {
                    return Err(AuditError::conflict(format!(
                        "email {email} is already registered to employee {}",
                        holder.id
                    )));
                }
            }
            employee.email = email;
        }
        if let Some(full_name) = input.full_name {
            required("full_name", &full_name)?;
            employee.full_name = full_name;
        }
        if let Some(department) = input.department {
            employee.department = department;
        }
        if let Some(position) = input.position {
            employee.position = position;
        }
        if let Some(company) = input.company {
            employee.company = company;
        }
        if let Some(location) = input.location {
            employee.location = location;
        }
        if let Some(is_active) = input.is_active {
            employee.is_active = is_active;
        }

        tx.put_employee(employee.clone()).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Update,
                entity_type: EntityType::Employee,
                entity_id: id,
                before: Some(before),
                after: Some(employee.capture()),
                details: Some(format!("Updated employee {}", employee.full_name)),
            },
        )
        .await?;
        tx.commit().await?;

        info!(employee_id = id, event_id, "Employee updated");
        Ok(Recorded {
            value: employee,
            event_id,
        })
    }

    pub async fn delete_employee(
        &self,
        actor: Actor,
        id: EntityId,
    ) -> AuditResult<Recorded<Employee>> {
        let mut tx = self.store.begin().await?;
        let now = self.now();
        let employee = tx
            .employee(id)
            .await?
            .ok_or_else(|| AuditError::not_found("employee", id))?;
        let dependents = tx.assignments_for_employee(id).await?.len();
        if dependents > 0 {
            return Err(AuditError::HasDependents {
                entity_type: EntityType::Employee,
                entity_id: id,
                dependents,
            });
        }

        tx.delete_employee(id).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Delete,
                entity_type: EntityType::Employee,
                entity_id: id,
                before: Some(employee.capture()),
                after: None,
                details: Some(format!("Deleted employee {}", employee.full_name)),
            },
        )
        .await?;
        tx.commit().await?;

        info!(employee_id = id, event_id, "Employee deleted");
        Ok(Recorded {
            value: employee,
            event_id,
        })
    }

    // -----------------------------------------------------------------------
    // Assignments
    // -----------------------------------------------------------------------

    pub async fn assign_device(
        &self,
        actor: Actor,
        input: AssignDevice,
    ) -> AuditResult<Recorded<Assignment>> {
        let mut tx = self.store.begin().await?;
        let now = self.now();
        let mut device = tx
            .device(input.device_id)
            .await?
            .ok_or_else(|| AuditError::not_found("device", input.device_id))?;
        let employee = tx
            .employee(input.employee_id)
            .await?
            .ok_or_else(|| AuditError::not_found("employee", input.employee_id))?;
        if device.status != DeviceStatus::Available {
            return Err(AuditError::conflict(format!(
                "device {} is {}, not available",
                device.id,
                device.status.as_str()
            )));
        }
        if !employee.is_active {
            return Err(AuditError::conflict(format!(
                "employee {} is inactive",
                employee.id
            )));
        }

        let before = AssignmentSnapshot::capture(None, &device);
        let link = Assignment {
            id: tx.allocate_id(EntityType::Assignment).await?,
            device_id: device.id,
            employee_id: employee.id,
            assigned_at: now,
            returned_at: None,
            notes: input.notes,
            return_observations: None,
        };
        device.status = DeviceStatus::Assigned;
        let after = AssignmentSnapshot::capture(Some(&link), &device);
        let details = format!(
            "Assigned device {} to employee {}",
            device.serial_number, employee.id
        );

        tx.put_assignment(link.clone()).await?;
        tx.put_device(device).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Assign,
                entity_type: EntityType::Assignment,
                entity_id: link.id,
                before: Some(Snapshot::Assignment(before)),
                after: Some(Snapshot::Assignment(after)),
                details: Some(details),
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            assignment_id = link.id,
            device_id = link.device_id,
            employee_id = link.employee_id,
            event_id,
            "Device assigned"
        );
        Ok(Recorded {
            value: link,
            event_id,
        })
    }

    pub async fn return_device(
        &self,
        actor: Actor,
        assignment_id: EntityId,
        input: ReturnDevice,
    ) -> AuditResult<Recorded<Assignment>> {
        let mut tx = self.store.begin().await?;
        let now = self.now();
        let mut link = tx
            .assignment(assignment_id)
            .await?
            .ok_or_else(|| AuditError::not_found("assignment", assignment_id))?;
        if !link.is_active() {
            return Err(AuditError::conflict(format!(
                "assignment {assignment_id} has already been returned"
            )));
        }
        let mut device = tx
            .device(link.device_id)
            .await?
            .ok_or_else(|| AuditError::not_found("device", link.device_id))?;

        let before = AssignmentSnapshot::capture(Some(&link), &device);
        link.returned_at = Some(now);
        link.return_observations = input.return_observations;
        device.status = DeviceStatus::Available;
        let after = AssignmentSnapshot::capture(Some(&link), &device);
        let details = format!(
            "Returned device {} from employee {}",
            device.serial_number, link.employee_id
        );

        tx.put_assignment(link.clone()).await?;
        tx.put_device(device).await?;
        let event_id = record_event(
            &mut tx,
            now,
            EventRecord {
                actor,
                action: Action::Return,
                entity_type: EntityType::Assignment,
                entity_id: link.id,
                before: Some(Snapshot::Assignment(before)),
                after: Some(Snapshot::Assignment(after)),
                details: Some(details),
            },
        )
        .await?;
        tx.commit().await?;

        info!(assignment_id, device_id = link.device_id, event_id, "Device returned");
        Ok(Recorded {
            value: link,
            event_id,
        })
    }

    /// Devices currently held by the employee through active assignments.
    pub async fn active_assets(&self, employee_id: EntityId) -> AuditResult<Vec<Device>> {
        let mut tx = self.store.begin().await?;
        if tx.employee(employee_id).await?.is_none() {
            return Err(AuditError::not_found("employee", employee_id));
        }
        let links = tx.assignments_for_employee(employee_id).await?;
        let mut devices = Vec::new();
        for link in links.into_iter().filter(Assignment::is_active) {
            if let Some(device) = tx.device(link.device_id).await? {
                devices.push(device);
            }
        }
        Ok(devices)
    }
}
