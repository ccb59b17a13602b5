//! Commands accepted by the telemetry daemon.

use tokio::sync::oneshot;

use crate::eventlog::LogEntry;
use crate::task::TaskKind;

/// One mutation of the telemetry aggregates. The `done` channel fires after
/// the daemon has applied, persisted, and published the change.
#[derive(Debug)]
pub enum TelemetryCommand {
    /// Terminal task outcome: append the entry, fold `bytes` into the
    /// bandwidth buckets, bump the per-kind counters.
    RecordTask {
        entry: LogEntry,
        kind: TaskKind,
        bytes: u64,
        done: oneshot::Sender<()>,
    },

    /// Engine-level system note (start/stop/reconcile/skip).
    Note {
        entry: LogEntry,
        done: oneshot::Sender<()>,
    },

    /// Empty the log, leaving a single system entry recording the clear.
    ClearLogs { done: oneshot::Sender<()> },

    /// Reset the in-memory session byte counter (on engine start).
    BeginSession { done: oneshot::Sender<()> },
}

impl TelemetryCommand {
    /// Command name for trace logging.
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryCommand::RecordTask { .. } => "record_task",
            TelemetryCommand::Note { .. } => "note",
            TelemetryCommand::ClearLogs { .. } => "clear_logs",
            TelemetryCommand::BeginSession { .. } => "begin_session",
        }
    }
}
