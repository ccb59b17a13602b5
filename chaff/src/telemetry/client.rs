//! Telemetry submission interface.
//!
//! Cheap to clone (a channel sender); every method awaits the daemon's ack
//! so callers resume only after the update is applied and persisted. If the
//! daemon has shut down the methods return silently; telemetry must never
//! take a task down with it.

use tokio::sync::{mpsc, oneshot};

use super::command::TelemetryCommand;
use crate::eventlog::LogEntry;
use crate::task::TaskKind;

/// Handle for submitting telemetry commands to the daemon.
#[derive(Clone)]
pub struct TelemetryClient {
    tx: mpsc::UnboundedSender<TelemetryCommand>,
}

impl TelemetryClient {
    pub fn new(tx: mpsc::UnboundedSender<TelemetryCommand>) -> Self {
        Self { tx }
    }

    async fn submit(&self, command: TelemetryCommand, done: oneshot::Receiver<()>) {
        if self.tx.send(command).is_err() {
            // Daemon is gone (shutdown); nothing left to wait for.
            return;
        }
        let _ = done.await;
    }

    /// Records one terminal task outcome and waits until it is durable.
    pub async fn record_task(&self, entry: LogEntry, kind: TaskKind, bytes: u64) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(
            TelemetryCommand::RecordTask {
                entry,
                kind,
                bytes,
                done: done_tx,
            },
            done_rx,
        )
        .await;
    }

    /// Appends an engine-level system note.
    pub async fn note(&self, entry: LogEntry) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(
            TelemetryCommand::Note {
                entry,
                done: done_tx,
            },
            done_rx,
        )
        .await;
    }

    /// Clears the log, leaving one system entry recording the clear.
    pub async fn clear_logs(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(TelemetryCommand::ClearLogs { done: done_tx }, done_rx)
            .await;
    }

    /// Zeroes the session byte counter.
    pub async fn begin_session(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(TelemetryCommand::BeginSession { done: done_tx }, done_rx)
            .await;
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("channel_closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn methods_return_when_daemon_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = TelemetryClient::new(tx);
        drop(rx);

        // Must not hang or panic.
        client.note(LogEntry::system(Utc::now(), "orphaned")).await;
        client.clear_logs().await;
        client.begin_session().await;
    }

    #[tokio::test]
    async fn commands_arrive_in_submission_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = TelemetryClient::new(tx);

        // Ack each command from a stand-in daemon.
        let daemon = tokio::spawn(async move {
            let mut names = Vec::new();
            while let Some(command) = rx.recv().await {
                names.push(command.name());
                match command {
                    TelemetryCommand::Note { done, .. }
                    | TelemetryCommand::ClearLogs { done }
                    | TelemetryCommand::BeginSession { done }
                    | TelemetryCommand::RecordTask { done, .. } => {
                        let _ = done.send(());
                    }
                }
                if names.len() == 3 {
                    break;
                }
            }
            names
        });

        client.begin_session().await;
        client.note(LogEntry::system(Utc::now(), "started")).await;
        client.clear_logs().await;

        let names = daemon.await.unwrap();
        assert_eq!(names, vec!["begin_session", "note", "clear_logs"]);
    }
}
