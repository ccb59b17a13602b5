//! The telemetry daemon: sole owner and sole writer of the event log,
//! bandwidth buckets, and task counters.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::client::TelemetryClient;
use super::command::TelemetryCommand;
use super::snapshot::{TelemetryReader, TelemetrySnapshot};
use crate::bandwidth::BandwidthAggregator;
use crate::defaults::{DAILY_BUCKET_CAPACITY, DAILY_STATS_CAPACITY, HOURLY_BUCKET_CAPACITY};
use crate::eventlog::{EventLog, LogEntry};
use crate::stats::TaskStats;
use crate::store::{self, StateKey, StateStore};

/// Owns the telemetry aggregates and applies commands strictly in arrival
/// order. Spawn with [`TelemetryDaemon::run`].
pub struct TelemetryDaemon<S: StateStore> {
    rx: mpsc::UnboundedReceiver<TelemetryCommand>,
    store: Arc<S>,
    log: EventLog,
    bandwidth: BandwidthAggregator,
    stats: TaskStats,
    shared: Arc<RwLock<TelemetrySnapshot>>,
}

impl<S: StateStore> TelemetryDaemon<S> {
    /// Seeds the aggregates from the store (unreadable sections fall back to
    /// empty defaults) and returns the daemon with its client and reader.
    pub async fn load(
        store: Arc<S>,
        log_capacity: usize,
    ) -> (Self, TelemetryClient, TelemetryReader) {
        let entries: Vec<LogEntry> = store::read_or_default(&*store, StateKey::Logs).await;
        let log = EventLog::from_entries(entries, log_capacity);

        let hourly = store::read_or_default(&*store, StateKey::BandwidthHourly).await;
        let daily = store::read_or_default(&*store, StateKey::BandwidthDaily).await;
        let bandwidth = BandwidthAggregator::from_buckets(
            hourly,
            daily,
            HOURLY_BUCKET_CAPACITY,
            DAILY_BUCKET_CAPACITY,
        );

        let stats: TaskStats = store::read_or_default(&*store, StateKey::Stats).await;
        let stats = stats.restore(DAILY_STATS_CAPACITY);

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(RwLock::new(TelemetrySnapshot::default()));

        let daemon = Self {
            rx,
            store,
            log,
            bandwidth,
            stats,
            shared: Arc::clone(&shared),
        };
        let reader = TelemetryReader::new(shared);

        (daemon, TelemetryClient::new(tx), reader)
    }

    /// Processes commands until shutdown is requested or every client is
    /// dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("telemetry daemon started");
        self.refresh_snapshot().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("telemetry daemon shutting down");
                    break;
                }

                command = self.rx.recv() => match command {
                    Some(command) => self.process(command).await,
                    None => break,
                }
            }
        }

        info!("telemetry daemon stopped");
    }

    async fn process(&mut self, command: TelemetryCommand) {
        trace!(command = command.name(), "processing telemetry command");

        match command {
            TelemetryCommand::RecordTask {
                entry,
                kind,
                bytes,
                done,
            } => {
                self.bandwidth.record(bytes, entry.timestamp);
                self.stats.record(kind, entry.timestamp);
                self.log.append(entry);
                self.persist_logs().await;
                self.persist_bandwidth().await;
                self.persist_stats().await;
                self.refresh_snapshot().await;
                let _ = done.send(());
            }
            TelemetryCommand::Note { entry, done } => {
                self.log.append(entry);
                self.persist_logs().await;
                self.refresh_snapshot().await;
                let _ = done.send(());
            }
            TelemetryCommand::ClearLogs { done } => {
                self.log
                    .clear_with_note(LogEntry::system(Utc::now(), "activity log cleared"));
                self.persist_logs().await;
                self.refresh_snapshot().await;
                let _ = done.send(());
            }
            TelemetryCommand::BeginSession { done } => {
                self.bandwidth.reset_session();
                self.refresh_snapshot().await;
                let _ = done.send(());
            }
        }
    }

    // Persistence failures are logged and swallowed: losing one telemetry
    // write must not fail the task that reported it.

    async fn persist_logs(&self) {
        let entries = self.log.entries();
        if let Err(error) = store::write_value(&*self.store, StateKey::Logs, &entries).await {
            warn!(%error, "failed to persist event log");
        }
    }

    async fn persist_bandwidth(&self) {
        if let Err(error) =
            store::write_value(&*self.store, StateKey::BandwidthHourly, self.bandwidth.hourly())
                .await
        {
            warn!(%error, "failed to persist hourly bandwidth");
        }
        if let Err(error) =
            store::write_value(&*self.store, StateKey::BandwidthDaily, self.bandwidth.daily())
                .await
        {
            warn!(%error, "failed to persist daily bandwidth");
        }
    }

    async fn persist_stats(&self) {
        if let Err(error) = store::write_value(&*self.store, StateKey::Stats, &self.stats).await {
            warn!(%error, "failed to persist task stats");
        }
    }

    async fn refresh_snapshot(&self) {
        let snapshot = TelemetrySnapshot {
            entries: self.log.entries(),
            hourly: self.bandwidth.hourly().clone(),
            daily: self.bandwidth.daily().clone(),
            session_bytes: self.bandwidth.session_bytes(),
            stats: self.stats.clone(),
        };
        *self.shared.write().await = snapshot;
    }
}
