//! Reversal strategies.
//!
//! A [`ReversalStrategy`] knows how to undo one kind of change, keyed by
//! `(entity_type, action)`. Strategies run against the orchestrator's open
//! transaction, so everything they write commits or rolls back together
//! with the revert marker and the REVERT event.

mod assignment;
mod entity;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::device::Device;
use assetlog_core::models::employee::Employee;
use assetlog_core::models::event::{Action, EligibilityReason, EntityType, Event};
use assetlog_core::repository::InventoryTx;
use assetlog_core::snapshot::Snapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use assignment::{AssignReversal, ReturnReversal};
pub use entity::{CreateReversal, DeleteReversal, StoredEntity, UpdateReversal};

use crate::eligibility::StrategyLookup;

/// How a successful reversal came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalOutcome {
    /// The inverse mutation was applied.
    Applied,
    /// The created entity was already gone; nothing to delete.
    AlreadyDeleted,
    /// The assignment was already returned; nothing to unlink.
    AlreadyReturned,
}

impl fmt::Display for ReversalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Applied => "applied",
            Self::AlreadyDeleted => "already_deleted",
            Self::AlreadyReturned => "already_returned",
        })
    }
}

/// What a strategy did: the state it replaced and the state it left.
#[derive(Debug, Clone)]
pub struct Reversal {
    pub outcome: ReversalOutcome,
    pub undone: Option<Snapshot>,
    pub restored: Option<Snapshot>,
}

impl Reversal {
    pub fn applied(undone: Option<Snapshot>, restored: Option<Snapshot>) -> Self {
        Self {
            outcome: ReversalOutcome::Applied,
            undone,
            restored,
        }
    }
}

#[async_trait]
pub trait ReversalStrategy<T: InventoryTx>: Send + Sync {
    fn entity_type(&self) -> EntityType;

    fn action(&self) -> Action;

    /// Apply the inverse of `event`. Any error leaves the transaction to be
    /// dropped by the caller.
    async fn revert(&self, event: &Event, tx: &mut T) -> AuditResult<Reversal>;
}

pub struct StrategyRegistry<T: InventoryTx> {
    strategies: HashMap<(EntityType, Action), Arc<dyn ReversalStrategy<T>>>,
}

impl<T: InventoryTx> Default for StrategyRegistry<T> {
    fn default() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }
}

impl<T: InventoryTx> StrategyRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering every producer action on devices, employees and
    /// assignments.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CreateReversal::<Device>::new());
        registry.register(UpdateReversal::<Device>::new());
        registry.register(DeleteReversal::<Device>::new());
        registry.register(CreateReversal::<Employee>::new());
        registry.register(UpdateReversal::<Employee>::new());
        registry.register(DeleteReversal::<Employee>::new());
        registry.register(AssignReversal);
        registry.register(ReturnReversal);
        registry
    }

    /// Register a strategy, replacing any previous one for the same key.
    pub fn register(&mut self, strategy: impl ReversalStrategy<T> + 'static) {
        let key = (strategy.entity_type(), strategy.action());
        self.strategies.insert(key, Arc::new(strategy));
    }

    pub fn get(
        &self,
        entity_type: EntityType,
        action: Action,
    ) -> Option<Arc<dyn ReversalStrategy<T>>> {
        self.strategies.get(&(entity_type, action)).cloned()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<T: InventoryTx> StrategyLookup for StrategyRegistry<T> {
    fn contains(&self, entity_type: EntityType, action: Action) -> bool {
        self.strategies.contains_key(&(entity_type, action))
    }
}

pub(crate) fn snapshot_before(event: &Event) -> AuditResult<&Snapshot> {
    event.snapshot_before.as_ref().ok_or(AuditError::NotRevertible {
        event_id: event.id,
        reason: EligibilityReason::MissingSnapshot,
    })
}

pub(crate) fn snapshot_after(event: &Event) -> AuditResult<&Snapshot> {
    event.snapshot_after.as_ref().ok_or(AuditError::NotRevertible {
        event_id: event.id,
        reason: EligibilityReason::MissingSnapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetlog_db::MemoryTx;

    #[test]
    fn defaults_cover_every_producer_action() {
        let registry = StrategyRegistry::<MemoryTx>::with_defaults();
        assert_eq!(registry.len(), 8);
        for entity_type in [EntityType::Device, EntityType::Employee] {
            for action in [Action::Create, Action::Update, Action::Delete] {
                assert!(registry.contains(entity_type, action));
            }
            assert!(!registry.contains(entity_type, Action::Assign));
        }
        assert!(registry.contains(EntityType::Assignment, Action::Assign));
        assert!(registry.contains(EntityType::Assignment, Action::Return));
        assert!(!registry.contains(EntityType::Assignment, Action::Revert));
    }

    #[test]
    fn registration_replaces_by_key() {
        let mut registry = StrategyRegistry::<MemoryTx>::new();
        assert!(registry.is_empty());
        registry.register(AssignReversal);
        registry.register(AssignReversal);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(EntityType::Assignment, Action::Assign).is_some());
        assert!(registry.get(EntityType::Assignment, Action::Return).is_none());
    }
}
