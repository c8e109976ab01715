//! Audit event domain model.
//!
//! An [`Event`] is immutable once appended, except for the
//! `reverted_at`/`reverted_by` pair which is set exactly once by the
//! revert orchestrator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};
use crate::snapshot::Snapshot;

pub type EventId = i64;
pub type EntityId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Update,
    Delete,
    Assign,
    Return,
    Revert,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Assign => "ASSIGN",
            Self::Return => "RETURN",
            Self::Revert => "REVERT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "ASSIGN" => Ok(Self::Assign),
            "RETURN" => Ok(Self::Return),
            "REVERT" => Ok(Self::Revert),
            other => Err(AuditError::validation(format!("unknown action: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Device,
    Employee,
    Assignment,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Employee => "employee",
            Self::Assignment => "assignment",
        }
    }

    /// Whether producers may record `action` against this entity type.
    /// REVERT is accepted everywhere but only the orchestrator emits it.
    pub fn supports(&self, action: Action) -> bool {
        match self {
            Self::Device | Self::Employee => matches!(
                action,
                Action::Create | Action::Update | Action::Delete | Action::Revert
            ),
            Self::Assignment => matches!(action, Action::Assign | Action::Return | Action::Revert),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "device" => Ok(Self::Device),
            "employee" => Ok(Self::Employee),
            "assignment" => Ok(Self::Assignment),
            other => Err(AuditError::validation(format!("unknown entity type: {other}"))),
        }
    }
}

/// The principal that caused a mutation. Persisted as a nullable string;
/// null means the system itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Actor {
    System,
    User(String),
}

impl Actor {
    pub fn user(name: impl Into<String>) -> Self {
        Self::User(name.into())
    }

    pub fn as_user(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::User(name) => Some(name),
        }
    }
}

impl From<Option<String>> for Actor {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(name) if !name.is_empty() => Self::User(name),
            _ => Self::System,
        }
    }
}

impl From<Actor> for Option<String> {
    fn from(actor: Actor) -> Self {
        match actor {
            Actor::System => None,
            Actor::User(name) => Some(name),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventState {
    Active,
    Reverted,
}

/// Why an event is or is not currently revertible. Derived on every query,
/// never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    Eligible,
    TerminalRevert,
    AlreadyReverted,
    WindowExpired,
    MissingSnapshot,
    NoStrategy,
}

impl EligibilityReason {
    pub fn is_revertible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

impl fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Eligible => "eligible",
            Self::TerminalRevert => "revert events are terminal",
            Self::AlreadyReverted => "already reverted",
            Self::WindowExpired => "revert window expired",
            Self::MissingSnapshot => "no snapshot of the prior state",
            Self::NoStrategy => "no reversal strategy registered",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub action: Action,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub snapshot_before: Option<Snapshot>,
    pub snapshot_after: Option<Snapshot>,
    /// Informational summary; never consulted by revert logic.
    pub details: Option<String>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<Actor>,
    pub reverts_event_id: Option<EventId>,
}

impl Event {
    pub fn state(&self) -> EventState {
        if self.reverted_at.is_some() {
            EventState::Reverted
        } else {
            EventState::Active
        }
    }
}

/// Input for appending an event. The store assigns the identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub action: Action,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub snapshot_before: Option<Snapshot>,
    pub snapshot_after: Option<Snapshot>,
    pub details: Option<String>,
    pub reverts_event_id: Option<EventId>,
}

impl CreateEvent {
    /// Check the structural invariants every stored event must satisfy.
    pub fn validate(&self) -> AuditResult<()> {
        if self.snapshot_before.is_none() && self.snapshot_after.is_none() {
            return Err(AuditError::validation(
                "an event needs at least one of snapshot_before / snapshot_after",
            ));
        }
        if !self.entity_type.supports(self.action) {
            return Err(AuditError::validation(format!(
                "action {} is not defined for {}",
                self.action, self.entity_type
            )));
        }
        match (self.action, self.reverts_event_id) {
            (Action::Revert, None) => {
                return Err(AuditError::validation(
                    "a REVERT event must reference the event it reverts",
                ));
            }
            (Action::Revert, Some(_)) => {}
            (_, Some(_)) => {
                return Err(AuditError::validation(
                    "only REVERT events may reference another event",
                ));
            }
            (_, None) => {}
        }
        for snapshot in [&self.snapshot_before, &self.snapshot_after]
            .into_iter()
            .flatten()
        {
            if snapshot.entity_type() != self.entity_type {
                return Err(AuditError::SnapshotMismatch {
                    expected: self.entity_type,
                    found: snapshot.entity_type(),
                });
            }
        }
        Ok(())
    }

    /// Materialize the stored event under the identifier the store assigned.
    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            timestamp: self.timestamp,
            actor: self.actor,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            snapshot_before: self.snapshot_before,
            snapshot_after: self.snapshot_after,
            details: self.details,
            reverted_at: None,
            reverted_by: None,
            reverts_event_id: self.reverts_event_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::employee::Employee;

    fn employee_snapshot() -> Snapshot {
        Snapshot::Employee(Employee {
            id: 1,
            full_name: "Ana Ruiz".into(),
            email: "ana@example.com".into(),
            department: None,
            position: None,
            company: None,
            location: None,
            is_active: true,
        })
    }

    fn create_event() -> CreateEvent {
        CreateEvent {
            timestamp: Utc::now(),
            actor: Actor::user("admin"),
            action: Action::Create,
            entity_type: EntityType::Employee,
            entity_id: 1,
            snapshot_before: None,
            snapshot_after: Some(employee_snapshot()),
            details: None,
            reverts_event_id: None,
        }
    }

    #[test]
    fn valid_create_event_passes() {
        create_event().validate().unwrap();
    }

    #[test]
    fn both_snapshots_missing_is_rejected() {
        let mut input = create_event();
        input.snapshot_after = None;
        assert!(matches!(input.validate(), Err(AuditError::Validation { .. })));
    }

    #[test]
    fn revert_requires_back_reference() {
        let mut input = create_event();
        input.action = Action::Revert;
        assert!(input.validate().is_err());
        input.reverts_event_id = Some(7);
        input.validate().unwrap();
    }

    #[test]
    fn snapshot_type_must_match_entity_type() {
        let mut input = create_event();
        input.entity_type = EntityType::Device;
        assert!(matches!(
            input.validate(),
            Err(AuditError::SnapshotMismatch {
                expected: EntityType::Device,
                found: EntityType::Employee
            })
        ));
    }

    #[test]
    fn assign_is_not_defined_for_devices() {
        let mut input = create_event();
        input.action = Action::Assign;
        assert!(input.validate().is_err());
    }

    #[test]
    fn actor_round_trips_through_optional_string() {
        assert_eq!(Actor::from(None), Actor::System);
        assert_eq!(Actor::from(Some("bob".to_string())), Actor::user("bob"));
        assert_eq!(Option::<String>::from(Actor::System), None);
        assert_eq!(Actor::System.to_string(), "system");
        let json = serde_json::to_string(&Actor::user("bob")).unwrap();
        assert_eq!(json, "\"bob\"");
        let back: Actor = serde_json::from_str("null").unwrap();
        assert_eq!(back, Actor::System);
    }

    #[test]
    fn action_and_entity_type_parse_case_insensitively() {
        assert_eq!("update".parse::<Action>().unwrap(), Action::Update);
        assert_eq!("Device".parse::<EntityType>().unwrap(), EntityType::Device);
        assert!("rename".parse::<Action>().is_err());
    }
}
