//! Task descriptors produced by the generator and consumed by the executor.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The kind of decoy action a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    Search,
    Browse,
    AdClick,
}

impl TaskKind {
    /// Stable lowercase name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Search => "search",
            TaskKind::Browse => "browse",
            TaskKind::AdClick => "adClick",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete decoy action, built once per batch entry and consumed
/// exactly once at dispatch.
///
/// The duration budget is drawn from the closed per-kind range in
/// [`crate::defaults::duration_range_ms`]; the target scheme is validated at
/// dispatch, not at generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    /// Destination URI. Only http/https targets pass dispatch validation.
    pub target: String,
    /// Wall-clock budget for the interaction phase.
    pub duration_budget: Duration,
    /// Offset from the owning tick at which this task fires.
    pub scheduled_offset: Duration,
    /// Engine id, for search tasks.
    pub search_engine: Option<String>,
    /// Query phrase, for search tasks.
    pub search_query: Option<String>,
}

/// Ordered batch of tasks covering one tick window.
///
/// Offsets are non-decreasing by construction (the Poisson accumulator only
/// moves forward). The scheduler replaces the batch wholesale each tick and
/// never mutates it partially.
#[derive(Debug, Default)]
pub struct PendingBatch {
    entries: Vec<TaskDescriptor>,
}

impl PendingBatch {
    /// Appends a task. Debug-asserts the non-decreasing offset invariant.
    pub fn push(&mut self, task: TaskDescriptor) {
        debug_assert!(
            self.entries
                .last()
                .map(|prev| prev.scheduled_offset <= task.scheduled_offset)
                .unwrap_or(true),
            "batch offsets must be non-decreasing"
        );
        self.entries.push(task);
    }

    /// Takes every entry, leaving the batch empty.
    pub fn take(&mut self) -> Vec<TaskDescriptor> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(offset_ms: u64) -> TaskDescriptor {
        TaskDescriptor {
            kind: TaskKind::Browse,
            target: "https://example.com".to_string(),
            duration_budget: Duration::from_secs(20),
            scheduled_offset: Duration::from_millis(offset_ms),
            search_engine: None,
            search_query: None,
        }
    }

    #[test]
    fn take_empties_the_batch() {
        let mut batch = PendingBatch::default();
        batch.push(task(100));
        batch.push(task(500));

        let taken = batch.take();
        assert_eq!(taken.len(), 2);
        assert!(batch.is_empty());
    }

    #[test]
    fn kind_serde_uses_camel_case() {
        assert_eq!(
            serde_json::to_string(&TaskKind::AdClick).unwrap(),
            "\"adClick\""
        );
        let kind: TaskKind = serde_json::from_str("\"search\"").unwrap();
        assert_eq!(kind, TaskKind::Search);
    }
}
