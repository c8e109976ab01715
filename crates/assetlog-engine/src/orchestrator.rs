//! Revert orchestration.
//!
//! One revert is one transaction: reload the event, re-check eligibility,
//! run the strategy, set the revert marker and append the REVERT event.
//! Returning early drops the transaction, which discards every write the
//! strategy staged.

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::canonical_timestamp;
use assetlog_core::models::event::{Action, Actor, CreateEvent, EventId};
use assetlog_core::repository::{InventoryStore, InventoryTx};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::eligibility;
use crate::service::AuditService;
use crate::strategy::ReversalOutcome;

/// Result of a successful revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertOutcome {
    pub revert_event_id: EventId,
    pub reverted_event_id: EventId,
    pub outcome: ReversalOutcome,
}

impl<S: InventoryStore> AuditService<S> {
    /// Revert the event `event_id` on behalf of `actor`.
    pub async fn revert_event(&self, event_id: EventId, actor: Actor) -> AuditResult<RevertOutcome> {
        let mut tx = self.store.begin().await?;

        // 1. Load the event.
        let event = tx
            .event(event_id)
            .await?
            .ok_or_else(|| AuditError::not_found("event", event_id))?;

        // 2. Re-check eligibility against the state this transaction sees.
        let now = canonical_timestamp(self.clock.now());
        let window = self.config.revert_window();
        let reason = eligibility::evaluate(&event, now, window, self.registry.as_ref());
        if let Some(err) = eligibility::refusal(&event, reason, window) {
            warn!(event_id, %reason, "Revert refused");
            return Err(err);
        }

        // 3. Resolve the strategy.
        let strategy = self
            .registry
            .get(event.entity_type, event.action)
            .ok_or(AuditError::NoStrategy {
                entity_type: event.entity_type,
                action: event.action,
            })?;

        // 4. Apply the inverse.
        let reversal = match strategy.revert(&event, &mut tx).await {
            Ok(reversal) => reversal,
            Err(err) => {
                warn!(
                    event_id,
                    entity_type = %event.entity_type,
                    entity_id = event.entity_id,
                    error = %err,
                    "Reversal strategy failed"
                );
                return Err(err);
            }
        };

        // 5. Mark the original and record the REVERT event.
        tx.mark_reverted(event_id, actor.clone(), now).await?;
        let revert = tx
            .append_event(CreateEvent {
                timestamp: now,
                actor: actor.clone(),
                action: Action::Revert,
                entity_type: event.entity_type,
                entity_id: event.entity_id,
                snapshot_before: reversal.undone,
                snapshot_after: reversal.restored,
                details: Some(format!(
                    "Reverted {} on {} {} (event {})",
                    event.action, event.entity_type, event.entity_id, event.id
                )),
                reverts_event_id: Some(event.id),
            })
            .await?;

        // 6. Commit.
        tx.commit().await?;

        info!(
            event_id,
            revert_event_id = revert.id,
            entity_type = %event.entity_type,
            entity_id = event.entity_id,
            actor = %actor,
            outcome = %reversal.outcome,
            "Event reverted"
        );

        Ok(RevertOutcome {
            revert_event_id: revert.id,
            reverted_event_id: event_id,
            outcome: reversal.outcome,
        })
    }
}
