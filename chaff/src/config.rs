//! Engine configuration.
//!
//! Runtime knobs for the scheduler and executor. Everything here has a
//! sensible default; hosts normally only override the tick period.

use std::time::Duration;

use crate::catalog::Catalog;
use crate::defaults::{
    DEFAULT_FALLBACK_BYTE_ESTIMATE, DEFAULT_GRACE, DEFAULT_HANDOFF_RETRY_DELAY,
    DEFAULT_LOG_CAPACITY, DEFAULT_TICK_PERIOD,
};

/// Configuration for the noise engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Scheduling period. One batch of tasks is planned per tick.
    pub tick_period: Duration,

    /// Maximum number of entries retained in the activity log.
    pub log_capacity: usize,

    /// Slack added on top of a task's duration budget before the executor
    /// abandons the interaction.
    pub grace: Duration,

    /// Delay before the single attach retry after a handoff race.
    pub handoff_retry_delay: Duration,

    /// Bytes attributed to a task that completed without any interaction
    /// summary.
    pub fallback_bytes: u64,

    /// Destination, search-engine, and query catalog tasks draw from.
    pub catalog: Catalog,
}

impl EngineConfig {
    /// Overrides the scheduling period.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Overrides the log capacity.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Replaces the built-in catalog.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            log_capacity: DEFAULT_LOG_CAPACITY,
            grace: DEFAULT_GRACE,
            handoff_retry_delay: DEFAULT_HANDOFF_RETRY_DELAY,
            fallback_bytes: DEFAULT_FALLBACK_BYTE_ESTIMATE,
            catalog: Catalog::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_period, DEFAULT_TICK_PERIOD);
        assert_eq!(config.log_capacity, DEFAULT_LOG_CAPACITY);
        assert!(!config.catalog.destinations.is_empty());
    }

    #[test]
    fn test_engine_config_builders() {
        let config = EngineConfig::default()
            .with_tick_period(Duration::from_millis(200))
            .with_log_capacity(10);
        assert_eq!(config.tick_period, Duration::from_millis(200));
        assert_eq!(config.log_capacity, 10);
    }
}
