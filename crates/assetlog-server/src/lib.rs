//! assetlog server — HTTP surface for browsing and reverting audit events.

pub mod api;
pub mod config;

pub use api::{ApiError, build_router};
pub use config::{ConfigError, ServerConfig};
