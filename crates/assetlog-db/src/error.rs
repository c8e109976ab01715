//! Database-specific error types and conversions.

use assetlog_core::error::AuditError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupted row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for AuditError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => AuditError::NotFound { entity, id },
            other => AuditError::Store(other.to_string()),
        }
    }
}
