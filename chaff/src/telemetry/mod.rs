//! Telemetry aggregation: the single writer behind the event log, bandwidth
//! buckets, and task counters.
//!
//! Concurrent task completions must not corrupt the ring buffer or lose
//! counter updates, so every mutation flows through one daemon that owns the
//! aggregates and persists them:
//!
//! ```text
//!   TaskExecutor ──┐
//!   Engine ────────┼──> TelemetryClient ──mpsc──> TelemetryDaemon ──> StateStore
//!   (clear-logs) ──┘         (acked)                   │
//!                                                      v
//!                              TelemetryReader <── RwLock<TelemetrySnapshot>
//! ```
//!
//! Commands carry a oneshot ack that fires after the daemon has applied the
//! mutation, persisted it, and refreshed the shared snapshot, so a task
//! that awaits `record_task` observes its own entry on the next read.

mod client;
mod command;
mod daemon;
mod snapshot;

pub use client::TelemetryClient;
pub use command::TelemetryCommand;
pub use daemon::TelemetryDaemon;
pub use snapshot::{TelemetryReader, TelemetrySnapshot};
