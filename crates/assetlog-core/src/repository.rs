//! Store trait definitions for data access abstraction.
//!
//! All store operations are async. Every mutation, whether performed by a
//! producer or by a revert, happens inside an [`InventoryTx`]: the entity
//! writes and the event append/mark of one logical operation either commit
//! together or not at all. Dropping a transaction without calling
//! [`InventoryTx::commit`] discards all of its writes.

use chrono::{DateTime, Utc};

use crate::error::AuditResult;
use crate::models::assignment::Assignment;
use crate::models::device::Device;
use crate::models::employee::Employee;
use crate::models::event::{Action, Actor, CreateEvent, EntityId, EntityType, Event, EventId};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

/// Query filters for the event log. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub action: Option<Action>,
    pub entity_type: Option<EntityType>,
    pub actor: Option<Actor>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.action.is_none_or(|a| a == event.action)
            && self.entity_type.is_none_or(|t| t == event.entity_type)
            && self.actor.as_ref().is_none_or(|a| *a == event.actor)
            && self.from.is_none_or(|from| event.timestamp >= from)
            && self.to.is_none_or(|to| event.timestamp <= to)
    }
}

// ---------------------------------------------------------------------------
// Store (outside any transaction)
// ---------------------------------------------------------------------------

pub trait InventoryStore: Send + Sync {
    type Tx: InventoryTx;

    /// Open a transactional boundary.
    fn begin(&self) -> impl Future<Output = AuditResult<Self::Tx>> + Send;

    /// Fails with `NotFound` if absent.
    fn get_event(&self, id: EventId) -> impl Future<Output = AuditResult<Event>> + Send;

    /// Matching events, newest first.
    fn list_events(
        &self,
        filter: EventFilter,
        pagination: Pagination,
    ) -> impl Future<Output = AuditResult<Vec<Event>>> + Send;
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

pub trait InventoryTx: Send + 'static {
    /// Reserve a fresh identifier. Identifiers are never reused, even when
    /// the reserving transaction rolls back.
    fn allocate_id(
        &mut self,
        entity_type: EntityType,
    ) -> impl Future<Output = AuditResult<EntityId>> + Send;

    fn device(&mut self, id: EntityId)
    -> impl Future<Output = AuditResult<Option<Device>>> + Send;
    fn device_by_serial(
        &mut self,
        serial_number: &str,
    ) -> impl Future<Output = AuditResult<Option<Device>>> + Send;
    fn put_device(&mut self, device: Device) -> impl Future<Output = AuditResult<()>> + Send;
    fn delete_device(&mut self, id: EntityId) -> impl Future<Output = AuditResult<()>> + Send;

    fn employee(
        &mut self,
        id: EntityId,
    ) -> impl Future<Output = AuditResult<Option<Employee>>> + Send;
    fn employee_by_email(
        &mut self,
        email: &str,
    ) -> impl Future<Output = AuditResult<Option<Employee>>> + Send;
    fn put_employee(&mut self, employee: Employee)
    -> impl Future<Output = AuditResult<()>> + Send;
    fn delete_employee(&mut self, id: EntityId) -> impl Future<Output = AuditResult<()>> + Send;

    fn assignment(
        &mut self,
        id: EntityId,
    ) -> impl Future<Output = AuditResult<Option<Assignment>>> + Send;
    /// Every assignment (active or returned) that references the device.
    fn assignments_for_device(
        &mut self,
        device_id: EntityId,
    ) -> impl Future<Output = AuditResult<Vec<Assignment>>> + Send;
    /// Every assignment (active or returned) that references the employee.
    fn assignments_for_employee(
        &mut self,
        employee_id: EntityId,
    ) -> impl Future<Output = AuditResult<Vec<Assignment>>> + Send;
    fn put_assignment(
        &mut self,
        assignment: Assignment,
    ) -> impl Future<Output = AuditResult<()>> + Send;
    fn delete_assignment(&mut self, id: EntityId)
    -> impl Future<Output = AuditResult<()>> + Send;

    fn event(&mut self, id: EventId) -> impl Future<Output = AuditResult<Option<Event>>> + Send;

    /// Append an event. No update or delete of event content exists.
    fn append_event(&mut self, input: CreateEvent)
    -> impl Future<Output = AuditResult<Event>> + Send;

    /// Compare-and-set of the revert marker: fails with `AlreadyReverted`
    /// when the event is already marked, here or in a concurrently
    /// committed transaction.
    fn mark_reverted(
        &mut self,
        id: EventId,
        by: Actor,
        at: DateTime<Utc>,
    ) -> impl Future<Output = AuditResult<()>> + Send;

    fn commit(self) -> impl Future<Output = AuditResult<()>> + Send;
}
