//! CREATE / UPDATE / DELETE reversal for standalone entities (devices and
//! employees).

use std::marker::PhantomData;

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::device::Device;
use assetlog_core::models::employee::Employee;
use assetlog_core::models::event::{Action, EntityId, EntityType, Event};
use assetlog_core::repository::InventoryTx;
use assetlog_core::snapshot::Tracked;
use async_trait::async_trait;

use super::{Reversal, ReversalOutcome, ReversalStrategy, snapshot_after, snapshot_before};

/// Persistence hooks the generic entity strategies need.
pub trait StoredEntity: Tracked {
    fn load<T: InventoryTx>(
        tx: &mut T,
        id: EntityId,
    ) -> impl Future<Output = AuditResult<Option<Self>>> + Send;

    fn save<T: InventoryTx>(self, tx: &mut T) -> impl Future<Output = AuditResult<()>> + Send;

    fn remove<T: InventoryTx>(
        tx: &mut T,
        id: EntityId,
    ) -> impl Future<Output = AuditResult<()>> + Send;

    /// Number of assignment records (active or returned) referencing the
    /// entity.
    fn dependents<T: InventoryTx>(
        tx: &mut T,
        id: EntityId,
    ) -> impl Future<Output = AuditResult<usize>> + Send;

    /// Another entity already holding this one's unique key, if any.
    fn unique_holder<T: InventoryTx>(
        &self,
        tx: &mut T,
    ) -> impl Future<Output = AuditResult<Option<EntityId>>> + Send;

    fn unique_key(&self) -> &str;
}

impl StoredEntity for Device {
    async fn load<T: InventoryTx>(tx: &mut T, id: EntityId) -> AuditResult<Option<Self>> {
        tx.device(id).await
    }

    async fn save<T: InventoryTx>(self, tx: &mut T) -> AuditResult<()> {
        tx.put_device(self).await
    }

    async fn remove<T: InventoryTx>(tx: &mut T, id: EntityId) -> AuditResult<()> {
        tx.delete_device(id).await
    }

    async fn dependents<T: InventoryTx>(tx: &mut T, id: EntityId) -> AuditResult<usize> {
        Ok(tx.assignments_for_device(id).await?.len())
    }

    async fn unique_holder<T: InventoryTx>(&self, tx: &mut T) -> AuditResult<Option<EntityId>> {
        Ok(tx
            .device_by_serial(&self.serial_number)
            .await?
            .map(|d| d.id)
            .filter(|id| *id != self.id))
    }

    fn unique_key(&self) -> &str {
        &self.serial_number
    }
}

impl StoredEntity for Employee {
    async fn load<T: InventoryTx>(tx: &mut T, id: EntityId) -> AuditResult<Option<Self>> {
        tx.employee(id).await
    }

    async fn save<T: InventoryTx>(self, tx: &mut T) -> AuditResult<()> {
        tx.put_employee(self).await
    }

    async fn remove<T: InventoryTx>(tx: &mut T, id: EntityId) -> AuditResult<()> {
        tx.delete_employee(id).await
    }

    async fn dependents<T: InventoryTx>(tx: &mut T, id: EntityId) -> AuditResult<usize> {
        Ok(tx.assignments_for_employee(id).await?.len())
    }

    async fn unique_holder<T: InventoryTx>(&self, tx: &mut T) -> AuditResult<Option<EntityId>> {
        Ok(tx
            .employee_by_email(&self.email)
            .await?
            .map(|e| e.id)
            .filter(|id| *id != self.id))
    }

    fn unique_key(&self) -> &str {
        &self.email
    }
}

fn unique_conflict<E: StoredEntity>(entity: &E, holder: EntityId) -> AuditError {
    AuditError::conflict(format!(
        "{} {} is already used by {} {}",
        E::ENTITY_TYPE,
        entity.unique_key(),
        E::ENTITY_TYPE,
        holder
    ))
}

fn stale<E: StoredEntity>(id: EntityId) -> AuditError {
    AuditError::Stale {
        entity_type: E::ENTITY_TYPE,
        entity_id: id,
    }
}

// ---------------------------------------------------------------------------
// CREATE
// ---------------------------------------------------------------------------

/// Undo a CREATE by deleting the entity.
pub struct CreateReversal<E>(PhantomData<fn() -> E>);

impl<E> CreateReversal<E> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for CreateReversal<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: InventoryTx, E: StoredEntity> ReversalStrategy<T> for CreateReversal<E> {
    fn entity_type(&self) -> EntityType {
        E::ENTITY_TYPE
    }

    fn action(&self) -> Action {
        Action::Create
    }

    async fn revert(&self, event: &Event, tx: &mut T) -> AuditResult<Reversal> {
        let created = snapshot_after(event)?;
        let Some(current) = E::load(tx, event.entity_id).await? else {
            return Ok(Reversal {
                outcome: ReversalOutcome::AlreadyDeleted,
                undone: Some(created.clone()),
                restored: None,
            });
        };

        let dependents = E::dependents(tx, event.entity_id).await?;
        if dependents > 0 {
            return Err(AuditError::HasDependents {
                entity_type: E::ENTITY_TYPE,
                entity_id: event.entity_id,
                dependents,
            });
        }

        E::remove(tx, event.entity_id).await?;
        Ok(Reversal::applied(Some(current.capture()), None))
    }
}

// ---------------------------------------------------------------------------
// UPDATE
// ---------------------------------------------------------------------------

/// Undo an UPDATE by applying the before-state, provided nothing else
/// changed the entity since.
pub struct UpdateReversal<E>(PhantomData<fn() -> E>);

impl<E> UpdateReversal<E> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for UpdateReversal<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: InventoryTx, E: StoredEntity> ReversalStrategy<T> for UpdateReversal<E> {
    fn entity_type(&self) -> EntityType {
        E::ENTITY_TYPE
    }

    fn action(&self) -> Action {
        Action::Update
    }

    async fn revert(&self, event: &Event, tx: &mut T) -> AuditResult<Reversal> {
        let before = snapshot_before(event)?;
        let after = snapshot_after(event)?;

        // Deleted since the update: the live state no longer matches either.
        let Some(mut entity) = E::load(tx, event.entity_id).await? else {
            return Err(stale::<E>(event.entity_id));
        };
        let undone = entity.capture();
        if !undone.matches(after) {
            return Err(stale::<E>(event.entity_id));
        }

        entity.apply(before)?;
        if let Some(holder) = entity.unique_holder(tx).await? {
            return Err(unique_conflict(&entity, holder));
        }

        let restored = entity.capture();
        entity.save(tx).await?;
        Ok(Reversal::applied(Some(undone), Some(restored)))
    }
}

// ---------------------------------------------------------------------------
// DELETE
// ---------------------------------------------------------------------------

/// Undo a DELETE by recreating the entity under its original identifier.
pub struct DeleteReversal<E>(PhantomData<fn() -> E>);

impl<E> DeleteReversal<E> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for DeleteReversal<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: InventoryTx, E: StoredEntity> ReversalStrategy<T> for DeleteReversal<E> {
    fn entity_type(&self) -> EntityType {
        E::ENTITY_TYPE
    }

    fn action(&self) -> Action {
        Action::Delete
    }

    async fn revert(&self, event: &Event, tx: &mut T) -> AuditResult<Reversal> {
        let snapshot = snapshot_before(event)?;
        if snapshot.entity_id() != Some(event.entity_id) {
            return Err(AuditError::validation(format!(
                "DELETE event {} does not snapshot {} {}",
                event.id,
                E::ENTITY_TYPE,
                event.entity_id
            )));
        }
        let entity = E::restore(snapshot)?;

        if E::load(tx, event.entity_id).await?.is_some() {
            return Err(AuditError::IdentifierReused {
                entity_type: E::ENTITY_TYPE,
                entity_id: event.entity_id,
            });
        }
        if let Some(holder) = entity.unique_holder(tx).await? {
            return Err(unique_conflict(&entity, holder));
        }

        let restored = entity.capture();
        entity.save(tx).await?;
        Ok(Reversal::applied(None, Some(restored)))
    }
}
