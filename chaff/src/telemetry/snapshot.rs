//! Read side of the telemetry daemon.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::eventlog::LogEntry;
use crate::stats::TaskStats;

/// Point-in-time copy of every aggregate, refreshed by the daemon after each
/// command and before the command's ack.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    /// Log entries, most-recent-first.
    pub entries: Vec<LogEntry>,
    pub hourly: BTreeMap<String, u64>,
    pub daily: BTreeMap<String, u64>,
    pub session_bytes: u64,
    pub stats: TaskStats,
}

/// Cheap cloneable read handle over the shared snapshot.
#[derive(Debug, Clone)]
pub struct TelemetryReader {
    shared: Arc<RwLock<TelemetrySnapshot>>,
}

impl TelemetryReader {
    pub(super) fn new(shared: Arc<RwLock<TelemetrySnapshot>>) -> Self {
        Self { shared }
    }

    /// Full snapshot clone.
    pub async fn snapshot(&self) -> TelemetrySnapshot {
        self.shared.read().await.clone()
    }

    /// Log entries, most-recent-first.
    pub async fn logs(&self) -> Vec<LogEntry> {
        self.shared.read().await.entries.clone()
    }

    pub async fn session_bytes(&self) -> u64 {
        self.shared.read().await.session_bytes
    }
}
