//! Revert eligibility.
//!
//! Eligibility is derived on every call from the event itself, the current
//! time and the registered strategies. Nothing here touches a store, so
//! the same evaluation annotates listings and guards the orchestrator.
//!
//! Rules, first failure wins:
//! 1. REVERT events are terminal.
//! 2. The event must not already be reverted.
//! 3. `now - timestamp` must not exceed the revert window.
//! 4. The snapshots the inverse needs must be present.
//! 5. A strategy must be registered for `(entity_type, action)`.

use assetlog_core::error::AuditError;
use assetlog_core::models::event::{Action, EligibilityReason, EntityType, Event, EventState};
use chrono::{DateTime, Duration, Utc};

/// Anything that can answer whether a reversal procedure exists.
pub trait StrategyLookup {
    fn contains(&self, entity_type: EntityType, action: Action) -> bool;
}

pub fn evaluate(
    event: &Event,
    now: DateTime<Utc>,
    window: Duration,
    strategies: &impl StrategyLookup,
) -> EligibilityReason {
    if event.action == Action::Revert {
        return EligibilityReason::TerminalRevert;
    }
    if event.state() == EventState::Reverted {
        return EligibilityReason::AlreadyReverted;
    }
    // A timestamp ahead of `now` (clock skew) counts as inside the window.
    if now - event.timestamp > window {
        return EligibilityReason::WindowExpired;
    }
    if !has_required_snapshots(event) {
        return EligibilityReason::MissingSnapshot;
    }
    if !strategies.contains(event.entity_type, event.action) {
        return EligibilityReason::NoStrategy;
    }
    EligibilityReason::Eligible
}

/// CREATE is undone from its after-state alone and DELETE from its
/// before-state alone; every other action compares one against live data
/// and restores the other.
fn has_required_snapshots(event: &Event) -> bool {
    let before = event.snapshot_before.is_some();
    let after = event.snapshot_after.is_some();
    match event.action {
        Action::Create => after,
        Action::Delete => before,
        _ => before && after,
    }
}

/// The error a revert attempt reports for an ineligible event.
pub fn refusal(event: &Event, reason: EligibilityReason, window: Duration) -> Option<AuditError> {
    match reason {
        EligibilityReason::Eligible => None,
        EligibilityReason::AlreadyReverted => Some(AuditError::AlreadyReverted {
            event_id: event.id,
        }),
        EligibilityReason::WindowExpired => Some(AuditError::WindowExpired {
            event_id: event.id,
            expired_at: event
                .timestamp
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }),
        EligibilityReason::NoStrategy => Some(AuditError::NoStrategy {
            entity_type: event.entity_type,
            action: event.action,
        }),
        EligibilityReason::TerminalRevert | EligibilityReason::MissingSnapshot => {
            Some(AuditError::NotRevertible {
                event_id: event.id,
                reason,
            })
        }
    }
}
