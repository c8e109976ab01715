//! Engine configuration.

use chrono::{Duration, TimeDelta};

/// Longest revert window a deployment may configure (ten years).
pub const MAX_REVERT_WINDOW_SECS: u64 = 10 * 365 * 86_400;

/// Configuration for the audit service.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long after its timestamp an event stays revertible
    /// (default: 604_800 = 7 days).
    pub revert_window_secs: u64,
    /// Page size used when a listing names none (default: 100).
    pub default_page_size: u64,
    /// Upper bound on any requested page size (default: 500).
    pub max_page_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            revert_window_secs: 604_800,
            default_page_size: 100,
            max_page_size: 500,
        }
    }
}

impl EngineConfig {
    pub fn revert_window(&self) -> Duration {
        i64::try_from(self.revert_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Resolve a requested page size against the configured bounds.
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}
