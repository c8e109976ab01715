//! assetlog database layer — store implementations for the audit engine.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - [`InventoryStore`](assetlog_core::repository::InventoryStore)
//!   implementations: [`MemoryStore`] and [`SurrealStore`]

mod connection;
mod error;
mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{MemoryStore, MemoryTx, SurrealStore, SurrealTx};
pub use schema::run_migrations;
