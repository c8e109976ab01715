//! assetlog engine — revert eligibility, reversal strategies, the revert
//! orchestrator and the producer adapter.

pub mod clock;
pub mod config;
pub mod eligibility;
pub mod orchestrator;
pub mod producer;
pub mod query;
pub mod service;
pub mod strategy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, MAX_REVERT_WINDOW_SECS};
pub use orchestrator::RevertOutcome;
pub use producer::{EventRecord, Recorded, Recorder, record_event};
pub use query::AuditEntry;
pub use service::AuditService;
pub use strategy::{Reversal, ReversalOutcome, ReversalStrategy, StrategyRegistry};
