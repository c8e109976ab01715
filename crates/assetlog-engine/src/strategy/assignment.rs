//! ASSIGN / RETURN reversal.
//!
//! An assignment event touches an aggregate: the link record plus the
//! status of the device it governs. Both strategies compare the live
//! aggregate against the event's after-state before writing, and write
//! the link and the device together.

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::event::{Action, EntityId, EntityType, Event};
use assetlog_core::repository::InventoryTx;
use assetlog_core::snapshot::{AssignmentSnapshot, Snapshot};
use async_trait::async_trait;

use super::{Reversal, ReversalOutcome, ReversalStrategy, snapshot_after, snapshot_before};

fn stale(entity_type: EntityType, entity_id: EntityId) -> AuditError {
    AuditError::Stale {
        entity_type,
        entity_id,
    }
}

/// Undo an ASSIGN: put the device status back and remove the link.
pub struct AssignReversal;

#[async_trait]
impl<T: InventoryTx> ReversalStrategy<T> for AssignReversal {
    fn entity_type(&self) -> EntityType {
        EntityType::Assignment
    }

    fn action(&self) -> Action {
        Action::Assign
    }

    async fn revert(&self, event: &Event, tx: &mut T) -> AuditResult<Reversal> {
        let before = snapshot_before(event)?.as_assignment()?;
        let after_snapshot = snapshot_after(event)?;
        let after = after_snapshot.as_assignment()?;
        let link_id = event.entity_id;

        let Some(mut device) = tx.device(after.device_id).await? else {
            return Err(stale(EntityType::Device, after.device_id));
        };
        let Some(link) = tx.assignment(link_id).await? else {
            return Err(stale(EntityType::Assignment, link_id));
        };

        let current = Snapshot::Assignment(AssignmentSnapshot::capture(Some(&link), &device));
        if !link.is_active() {
            // Returned independently since; the assignment is already undone.
            return Ok(Reversal {
                outcome: ReversalOutcome::AlreadyReturned,
                undone: Some(current.clone()),
                restored: Some(current),
            });
        }
        if !current.matches(after_snapshot) {
            return Err(stale(EntityType::Assignment, link_id));
        }

        device.status = before.device_status;
        let restored = Snapshot::Assignment(AssignmentSnapshot::capture(None, &device));
        tx.put_device(device).await?;
        tx.delete_assignment(link_id).await?;
        Ok(Reversal::applied(Some(current), Some(restored)))
    }
}

/// Undo a RETURN: re-open the link and put the device back into the state
/// it had while assigned.
pub struct ReturnReversal;

#[async_trait]
impl<T: InventoryTx> ReversalStrategy<T> for ReturnReversal {
    fn entity_type(&self) -> EntityType {
        EntityType::Assignment
    }

    fn action(&self) -> Action {
        Action::Return
    }

    async fn revert(&self, event: &Event, tx: &mut T) -> AuditResult<Reversal> {
        let before = snapshot_before(event)?.as_assignment()?;
        let after_snapshot = snapshot_after(event)?;
        let after = after_snapshot.as_assignment()?;
        let link_id = event.entity_id;
        let Some(open_link) = before.link.clone() else {
            return Err(AuditError::validation(format!(
                "RETURN event {} does not record the link it closed",
                event.id
            )));
        };

        let device_links = tx.assignments_for_device(after.device_id).await?;
        if let Some(other) = device_links
            .iter()
            .find(|a| a.is_active() && a.id != link_id)
        {
            return Err(AuditError::conflict(format!(
                "device {} is assigned to employee {} (assignment {})",
                after.device_id, other.employee_id, other.id
            )));
        }

        let Some(mut device) = tx.device(after.device_id).await? else {
            return Err(stale(EntityType::Device, after.device_id));
        };
        let Some(link) = tx.assignment(link_id).await? else {
            return Err(stale(EntityType::Assignment, link_id));
        };
        let current = Snapshot::Assignment(AssignmentSnapshot::capture(Some(&link), &device));
        if !current.matches(after_snapshot) {
            return Err(stale(EntityType::Assignment, link_id));
        }
        if tx.employee(open_link.employee_id).await?.is_none() {
            return Err(stale(EntityType::Employee, open_link.employee_id));
        }

        device.status = before.device_status;
        let restored = Snapshot::Assignment(AssignmentSnapshot::capture(Some(&open_link), &device));
        tx.put_assignment(open_link).await?;
        tx.put_device(device).await?;
        Ok(Reversal::applied(Some(current), Some(restored)))
    }
}
