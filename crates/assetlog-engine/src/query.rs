//! Read side: events annotated with their current eligibility.

use assetlog_core::error::{AuditError, AuditResult};
use assetlog_core::models::event::{EligibilityReason, Event, EventId};
use assetlog_core::repository::{EventFilter, InventoryStore, Pagination};
use serde::Serialize;

use crate::service::AuditService;

/// An event as presented to callers.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub event: Event,
    /// `"system"` when no actor was recorded.
    pub actor_display: String,
    pub is_revertible: bool,
    pub eligibility: EligibilityReason,
}

impl<S: InventoryStore> AuditService<S> {
    fn annotate(&self, event: Event) -> AuditEntry {
        let eligibility = self.eligibility(&event);
        AuditEntry {
            actor_display: event.actor.to_string(),
            is_revertible: eligibility.is_revertible(),
            eligibility,
            event,
        }
    }

    /// Matching events, newest first. `limit` falls back to the configured
    /// default and is capped at the configured maximum.
    pub async fn list_events(
        &self,
        filter: EventFilter,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> AuditResult<Vec<AuditEntry>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(AuditError::validation(
                    "`from` must not be later than `to`",
                ));
            }
        }
        let pagination = Pagination {
            offset: skip.unwrap_or(0),
            limit: self.config.page_size(limit),
        };
        let events = self.store.list_events(filter, pagination).await?;
        Ok(events.into_iter().map(|e| self.annotate(e)).collect())
    }

    pub async fn get_event(&self, id: EventId) -> AuditResult<AuditEntry> {
        let event = self.store.get_event(id).await?;
        Ok(self.annotate(event))
    }
}
