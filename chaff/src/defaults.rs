//! Default values and constants for the noise engine.
//!
//! Contains all `DEFAULT_*` constants plus the per-kind duration ranges
//! used when drawing task budgets.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::task::TaskKind;

// =============================================================================
// Scheduling
// =============================================================================

/// Default tick period: the window each Poisson arrival batch covers.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(60);

// =============================================================================
// Task execution
// =============================================================================

/// Fixed grace added on top of a task's duration budget before the
/// hard timeout fires.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Delay before the single "begin interaction" hand-off retry.
pub const DEFAULT_HANDOFF_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Byte estimate used when a task completes without an interaction
/// collaborator (rough average page transfer).
pub const DEFAULT_FALLBACK_BYTE_ESTIMATE: u64 = 200_000;

/// Closed millisecond range a task's duration budget is drawn from,
/// keyed by task kind.
pub fn duration_range_ms(kind: TaskKind) -> RangeInclusive<u64> {
    match kind {
        TaskKind::Search => 8_000..=20_000,
        TaskKind::Browse => 15_000..=45_000,
        TaskKind::AdClick => 5_000..=12_000,
    }
}

// =============================================================================
// Telemetry bounds
// =============================================================================

/// Event log ring capacity.
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Hour buckets retained by the bandwidth aggregator.
pub const HOURLY_BUCKET_CAPACITY: usize = 24;

/// Day buckets retained by the bandwidth aggregator.
pub const DAILY_BUCKET_CAPACITY: usize = 30;

/// Day keys retained in the per-day task counters.
pub const DAILY_STATS_CAPACITY: usize = 30;

// =============================================================================
// Task mix
// =============================================================================

/// Default weight of search tasks in the task mix.
pub const DEFAULT_SEARCH_WEIGHT: f64 = 50.0;

/// Default weight of browse tasks in the task mix.
pub const DEFAULT_BROWSE_WEIGHT: f64 = 35.0;

/// Default weight of ad-click tasks in the task mix.
pub const DEFAULT_AD_CLICK_WEIGHT: f64 = 15.0;
