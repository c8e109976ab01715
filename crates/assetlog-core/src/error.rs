//! Error types for the audit & revert engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::event::{Action, EligibilityReason, EntityId, EntityType, EventId};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Event {event_id} has already been reverted")]
    AlreadyReverted { event_id: EventId },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Event {event_id} left its revert window at {expired_at}")]
    WindowExpired {
        event_id: EventId,
        expired_at: DateTime<Utc>,
    },

    #[error("No reversal strategy for {action} on {entity_type}")]
    NoStrategy {
        entity_type: EntityType,
        action: Action,
    },

    #[error("Event {event_id} cannot be reverted: {reason}")]
    NotRevertible {
        event_id: EventId,
        reason: EligibilityReason,
    },

    #[error("{entity_type} {entity_id} changed since the event was recorded")]
    Stale {
        entity_type: EntityType,
        entity_id: EntityId,
    },

    #[error("{entity_type} {entity_id} is still referenced by {dependents} record(s)")]
    HasDependents {
        entity_type: EntityType,
        entity_id: EntityId,
        dependents: usize,
    },

    #[error("Identifier {entity_id} of {entity_type} has been assigned to another record")]
    IdentifierReused {
        entity_type: EntityType,
        entity_id: EntityId,
    },

    #[error("Snapshot of a {found} cannot be applied to a {expected}")]
    SnapshotMismatch {
        expected: EntityType,
        found: EntityType,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuditError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used by callers to pick a message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::AlreadyReverted { .. } => "AlreadyReverted",
            Self::Conflict { .. } => "Conflict",
            Self::WindowExpired { .. } => "WindowExpired",
            Self::NoStrategy { .. } => "NoStrategy",
            Self::NotRevertible { .. } => "NotRevertible",
            Self::Stale { .. } => "Stale",
            Self::HasDependents { .. } => "HasDependents",
            Self::IdentifierReused { .. } => "IdentifierReused",
            Self::SnapshotMismatch { .. } => "SnapshotMismatch",
            Self::Validation { .. } => "Validation",
            Self::Store(_) => "StoreError",
            Self::Internal(_) => "Internal",
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
