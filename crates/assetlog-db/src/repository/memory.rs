//! In-process [`InventoryStore`] used by tests and the `mem` profile of the
//! server.
//!
//! One transaction runs at a time: `begin` takes an owned lock on the
//! committed inventory and works on a private copy, `commit` swaps the copy
//! in, and dropping the transaction simply releases the lock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::assignment::Assignment;
use assetlog_core::models::canonical_timestamp;
use assetlog_core::models::device::Device;
use assetlog_core::models::employee::Employee;
use assetlog_core::models::event::{Actor, CreateEvent, EntityId, EntityType, Event, EventId};
use assetlog_core::repository::{EventFilter, InventoryStore, InventoryTx, Pagination};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct Inventory {
    devices: BTreeMap<EntityId, Device>,
    employees: BTreeMap<EntityId, Employee>,
    assignments: BTreeMap<EntityId, Assignment>,
    events: BTreeMap<EventId, Event>,
}

/// Identifier sequences live outside the transactional state so a rolled
/// back transaction never hands its ids out again.
#[derive(Debug, Default)]
struct Sequences {
    device: AtomicI64,
    employee: AtomicI64,
    assignment: AtomicI64,
    event: AtomicI64,
}

impl Sequences {
    fn next_entity(&self, entity_type: EntityType) -> EntityId {
        let counter = match entity_type {
            EntityType::Device => &self.device,
            EntityType::Employee => &self.employee,
            EntityType::Assignment => &self.assignment,
        };
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn next_event(&self) -> EventId {
        self.event.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<Inventory>>,
    sequences: Arc<Sequences>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InventoryStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AuditResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            sequences: self.sequences.clone(),
        })
    }

    async fn get_event(&self, id: EventId) -> AuditResult<Event> {
        self.state
            .lock()
            .await
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| AuditError::not_found("event", id))
    }

    async fn list_events(
        &self,
        filter: EventFilter,
        pagination: Pagination,
    ) -> AuditResult<Vec<Event>> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .values()
            .rev()
            .filter(|e| filter.matches(e))
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Inventory>,
    working: Inventory,
    sequences: Arc<Sequences>,
}

impl InventoryTx for MemoryTx {
    async fn allocate_id(&mut self, entity_type: EntityType) -> AuditResult<EntityId> {
        Ok(self.sequences.next_entity(entity_type))
    }

    async fn device(&mut self, id: EntityId) -> AuditResult<Option<Device>> {
        Ok(self.working.devices.get(&id).cloned())
    }

    async fn device_by_serial(&mut self, serial_number: &str) -> AuditResult<Option<Device>> {
        Ok(self
            .working
            .devices
            .values()
            .find(|d| d.serial_number == serial_number)
            .cloned())
    }

    async fn put_device(&mut self, device: Device) -> AuditResult<()> {
        if self
            .working
            .devices
            .values()
            .any(|d| d.id != device.id && d.serial_number == device.serial_number)
        {
            return Err(AuditError::conflict(format!(
                "serial number {} is already registered",
                device.serial_number
            )));
        }
        self.working.devices.insert(device.id, device);
        Ok(())
    }

    async fn delete_device(&mut self, id: EntityId) -> AuditResult<()> {
        self.working.devices.remove(&id);
        Ok(())
    }

    async fn employee(&mut self, id: EntityId) -> AuditResult<Option<Employee>> {
        Ok(self.working.employees.get(&id).cloned())
    }

    async fn employee_by_email(&mut self, email: &str) -> AuditResult<Option<Employee>> {
        Ok(self
            .working
            .employees
            .values()
            .find(|e| e.email == email)
            .cloned())
    }

    async fn put_employee(&mut self, employee: Employee) -> AuditResult<()> {
        if self
            .working
            .employees
            .values()
            .any(|e| e.id != employee.id && e.email == employee.email)
        {
            return Err(AuditError::conflict(format!(
                "email {} is already registered",
                employee.email
            )));
        }
        self.working.employees.insert(employee.id, employee);
        Ok(())
    }

    async fn delete_employee(&mut self, id: EntityId) -> AuditResult<()> {
        self.working.employees.remove(&id);
        Ok(())
    }

    async fn assignment(&mut self, id: EntityId) -> AuditResult<Option<Assignment>> {
        Ok(self.working.assignments.get(&id).cloned())
    }

    async fn assignments_for_device(&mut self, device_id: EntityId) -> AuditResult<Vec<Assignment>> {
        Ok(self
            .working
            .assignments
            .values()
            .filter(|a| a.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn assignments_for_employee(
        &mut self,
        employee_id: EntityId,
    ) -> AuditResult<Vec<Assignment>> {
        Ok(self
            .working
            .assignments
            .values()
            .filter(|a| a.employee_id == employee_id)
            .cloned()
            .collect())
    }

    async fn put_assignment(&mut self, assignment: Assignment) -> AuditResult<()> {
        self.working.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn delete_assignment(&mut self, id: EntityId) -> AuditResult<()> {
        self.working.assignments.remove(&id);
        Ok(())
    }

    async fn event(&mut self, id: EventId) -> AuditResult<Option<Event>> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn append_event(&mut self, mut input: CreateEvent) -> AuditResult<Event> {
        input.validate()?;
        input.timestamp = canonical_timestamp(input.timestamp);
        let event = input.into_event(self.sequences.next_event());
        self.working.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn mark_reverted(&mut self, id: EventId, by: Actor, at: DateTime<Utc>) -> AuditResult<()> {
        let event = self
            .working
            .events
            .get_mut(&id)
            .ok_or_else(|| AuditError::not_found("event", id))?;
        if event.reverted_at.is_some() {
            return Err(AuditError::AlreadyReverted { event_id: id });
        }
        event.reverted_at = Some(canonical_timestamp(at));
        event.reverted_by = Some(by);
        Ok(())
    }

    async fn commit(self) -> AuditResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = self;
        debug!(events = working.events.len(), "Committing in-memory transaction");
        *guard = working;
        Ok(())
    }
}
