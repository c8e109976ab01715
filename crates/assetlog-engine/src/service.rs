//! The audit service: the engine's entry point for listing, inspecting and
//! reverting events.

use std::sync::Arc;

use assetlog_core::models::event::{EligibilityReason, Event};
use assetlog_core::repository::InventoryStore;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::eligibility;
use crate::strategy::StrategyRegistry;

/// Audit service.
///
/// Generic over the store implementation so that the engine has no
/// dependency on the database crate.
pub struct AuditService<S: InventoryStore> {
    pub(crate) store: S,
    pub(crate) registry: Arc<StrategyRegistry<S::Tx>>,
    pub(crate) config: EngineConfig,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<S: InventoryStore> AuditService<S> {
    /// Service with every default strategy registered and the system clock.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            registry: Arc::new(StrategyRegistry::with_defaults()),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry<S::Tx>) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current eligibility of `event`.
    pub fn eligibility(&self, event: &Event) -> EligibilityReason {
        eligibility::evaluate(
            event,
            self.clock.now(),
            self.config.revert_window(),
            self.registry.as_ref(),
        )
    }
}
