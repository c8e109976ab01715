//! assetlog core — domain models, error taxonomy, snapshot codec and store
//! contracts shared by every crate in the workspace.

pub mod error;
pub mod models;
pub mod repository;
pub mod snapshot;

pub use error::{AuditError, AuditResult};
pub use snapshot::{AssignmentSnapshot, Snapshot, Tracked};
