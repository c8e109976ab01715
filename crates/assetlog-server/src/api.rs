//! REST surface over the audit service.

use std::sync::Arc;

use assetlog_core::error::AuditError;
use assetlog_core::models::event::{Action, Actor, EntityType, EventId};
use assetlog_core::repository::{EventFilter, InventoryStore};
use assetlog_engine::{AuditEntry, AuditService, RevertOutcome};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Build the router. Generic over the store so tests can serve an
/// in-memory inventory.
pub fn build_router<S>(audit: Arc<AuditService<S>>) -> Router
where
    S: InventoryStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/audit-logs", get(list_events::<S>))
        .route("/audit-logs/", get(list_events::<S>))
        .route("/audit-logs/:id", get(get_event::<S>))
        .route("/audit-logs/:id/revert", post(revert_event::<S>))
        .with_state(audit)
}

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// An [`AuditError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AuditError);

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AuditError::NotFound { .. } => StatusCode::NOT_FOUND,
            AuditError::AlreadyReverted { .. }
            | AuditError::Conflict { .. }
            | AuditError::Stale { .. }
            | AuditError::HasDependents { .. }
            | AuditError::IdentifierReused { .. } => StatusCode::CONFLICT,
            AuditError::WindowExpired { .. }
            | AuditError::NoStrategy { .. }
            | AuditError::NotRevertible { .. }
            | AuditError::SnapshotMismatch { .. }
            | AuditError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuditError::Store(_) | AuditError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    /// User name; `system` selects events without a user.
    pub actor: Option<String>,
    /// RFC 3339.
    pub from: Option<String>,
    pub to: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl ListParams {
    fn filter(&self) -> Result<EventFilter, AuditError> {
        Ok(EventFilter {
            action: self
                .action
                .as_deref()
                .map(str::parse::<Action>)
                .transpose()?,
            entity_type: self
                .entity_type
                .as_deref()
                .map(str::parse::<EntityType>)
                .transpose()?,
            actor: self.actor.as_deref().map(|name| match name {
                "system" => Actor::System,
                name => Actor::user(name),
            }),
            from: self.from.as_deref().map(|s| timestamp("from", s)).transpose()?,
            to: self.to.as_deref().map(|s| timestamp("to", s)).transpose()?,
        })
    }
}

fn timestamp(param: &str, value: &str) -> Result<DateTime<Utc>, AuditError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AuditError::validation(format!("`{param}` is not an RFC 3339 timestamp: {e}")))
}

async fn list_events<S: InventoryStore + 'static>(
    State(audit): State<Arc<AuditService<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let filter = params.filter()?;
    let entries = audit.list_events(filter, params.skip, params.limit).await?;
    Ok(Json(entries))
}

async fn get_event<S: InventoryStore + 'static>(
    State(audit): State<Arc<AuditService<S>>>,
    Path(id): Path<EventId>,
) -> Result<Json<AuditEntry>, ApiError> {
    Ok(Json(audit.get_event(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RevertRequest {
    /// Absent or null reverts as the system.
    #[serde(default)]
    pub actor: Option<String>,
}

impl RevertRequest {
    /// An empty body is a request without an actor.
    fn from_body(body: &[u8]) -> Result<Self, AuditError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AuditError::validation(format!("invalid revert request: {e}")))
    }
}

async fn revert_event<S: InventoryStore + 'static>(
    State(audit): State<Arc<AuditService<S>>>,
    Path(id): Path<EventId>,
    body: Bytes,
) -> Result<Json<RevertOutcome>, ApiError> {
    let request = RevertRequest::from_body(&body)?;
    let outcome = audit.revert_event(id, Actor::from(request.actor)).await?;
    Ok(Json(outcome))
}
