//! Single-task execution.
//!
//! [`TaskExecutor::run`] drives one task through its whole lifecycle: gate on
//! engine state, validate the target, open a resource, race the interaction
//! collaborator against the task's timeout, then release the resource and
//! record exactly one telemetry entry. Tasks are isolated; no failure here
//! propagates to the scheduler or to other in-flight tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::eventlog::{InteractionCounts, LogEntry, LogStatus};
use crate::host::{
    AttachError, InteractionRequest, InteractionSummary, ResourceHost, ResourceId,
};
use crate::task::{TaskDescriptor, TaskKind};
use crate::telemetry::TelemetryClient;

/// Engine lifecycle gate, re-checked by every executor at fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Stopped,
    Running,
}

/// Executor-facing slice of the engine configuration.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Slack past the duration budget before a task is reaped.
    pub grace: Duration,

    /// Delay before the single hand-off retry.
    pub handoff_retry_delay: Duration,

    /// Byte estimate attributed to zero-interaction successes.
    pub fallback_bytes: u64,
}

impl From<&EngineConfig> for ExecutorConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            grace: config.grace,
            handoff_retry_delay: config.handoff_retry_delay,
            fallback_bytes: config.fallback_bytes,
        }
    }
}

/// Resources the engine currently believes are open.
///
/// Each id has exactly one owner at cleanup time: whoever wins the `remove`
/// also closes the resource. The executor removes on its own exit paths and
/// the engine's stop sweep removes whatever is left, so a resource is never
/// closed twice.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    open: DashMap<ResourceId, TaskKind>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ResourceId, kind: TaskKind) {
        self.open.insert(id, kind);
    }

    /// True when this call removed the id, making the caller responsible
    /// for closing the resource.
    pub fn remove(&self, id: ResourceId) -> bool {
        self.open.remove(&id).is_some()
    }

    /// Removes and returns every registered id. Used by the stop sweep.
    pub fn drain(&self) -> Vec<ResourceId> {
        let ids: Vec<ResourceId> = self.open.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.open.remove(id).is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Outcome of the interaction race, before timeout classification.
enum InteractOutcome {
    /// The collaborator reported completion.
    Completed(InteractionSummary),
    /// No collaborator could attach; the budget was waited out instead.
    Degraded,
}

/// Runs individual tasks against the resource host.
pub struct TaskExecutor<H: ResourceHost> {
    host: Arc<H>,
    telemetry: TelemetryClient,
    registry: Arc<ResourceRegistry>,
    status: watch::Receiver<EngineStatus>,
    config: ExecutorConfig,
}

impl<H: ResourceHost> TaskExecutor<H> {
    pub fn new(
        host: Arc<H>,
        telemetry: TelemetryClient,
        registry: Arc<ResourceRegistry>,
        status: watch::Receiver<EngineStatus>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            host,
            telemetry,
            registry,
            status,
            config,
        }
    }

    /// Executes one task to its terminal state. Always records exactly one
    /// telemetry entry unless the engine stopped before dispatch or the
    /// target was invalid.
    pub async fn run(&self, task: TaskDescriptor) {
        if *self.status.borrow() != EngineStatus::Running {
            debug!(target = %task.target, "engine stopped before dispatch, dropping task");
            return;
        }

        if !valid_target(&task.target) {
            warn!(target = %task.target, "skipping task with invalid target");
            self.telemetry
                .note(LogEntry::system(
                    Utc::now(),
                    format!("skipped task with invalid target {}", task.target),
                ))
                .await;
            return;
        }

        let id = match self.host.open(&task.target).await {
            Ok(id) => id,
            Err(error) => {
                debug!(target = %task.target, %error, "resource open failed");
                self.record(
                    &task,
                    LogStatus::ResourceFailed,
                    None,
                    Some(InteractionCounts::default()),
                    0,
                    format!("failed to open {}: {error}", task.target),
                )
                .await;
                return;
            }
        };
        self.registry.insert(id, task.kind);

        let started = Instant::now();
        let deadline = task.duration_budget + self.config.grace;
        let outcome = timeout(deadline, self.interact(id, &task)).await;

        // Whoever wins the registry removal closes the resource; the stop
        // sweep may already have taken it.
        if self.registry.remove(id) {
            if let Err(error) = self.host.close(id).await {
                debug!(%id, %error, "failed to close resource");
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(InteractOutcome::Completed(summary)) => {
                self.record(
                    &task,
                    LogStatus::Success,
                    Some(elapsed_ms),
                    Some(InteractionCounts {
                        scrolls: summary.scrolls,
                        clicks: summary.clicks,
                    }),
                    summary.bytes_estimated,
                    success_message(&task),
                )
                .await;
            }
            Ok(InteractOutcome::Degraded) => {
                self.record(
                    &task,
                    LogStatus::Success,
                    Some(elapsed_ms),
                    Some(InteractionCounts::default()),
                    self.config.fallback_bytes,
                    success_message(&task),
                )
                .await;
            }
            Err(_) => {
                self.record(
                    &task,
                    LogStatus::Timeout,
                    Some(elapsed_ms),
                    None,
                    0,
                    format!("interaction with {} timed out", task.target),
                )
                .await;
            }
        }
    }

    /// Hands off to the collaborator and awaits its single completion event.
    ///
    /// A hand-off race gets one retry after a short delay; a second race, or
    /// a collaborator that drops its channel without reporting, degrades to
    /// the never-replies case and parks until the outer timeout reaps it.
    async fn interact(&self, id: ResourceId, task: &TaskDescriptor) -> InteractOutcome {
        let started = Instant::now();
        let request = InteractionRequest {
            duration_budget: task.duration_budget,
            kind: task.kind,
        };

        let receiver = match self.host.begin_interaction(id, request).await {
            Ok(receiver) => Some(receiver),
            Err(AttachError::NoCollaborator) => None,
            Err(AttachError::HandoffRace) => {
                sleep(self.config.handoff_retry_delay).await;
                match self.host.begin_interaction(id, request).await {
                    Ok(receiver) => Some(receiver),
                    Err(AttachError::NoCollaborator) => None,
                    Err(AttachError::HandoffRace) => {
                        debug!(%id, "hand-off raced twice, leaving task to its timeout");
                        return std::future::pending().await;
                    }
                }
            }
        };

        let Some(receiver) = receiver else {
            // Attach failure: hold the resource for what is left of the
            // budget, then report a zero-interaction success.
            let remaining = task.duration_budget.saturating_sub(started.elapsed());
            sleep(remaining).await;
            return InteractOutcome::Degraded;
        };

        match receiver.await {
            Ok(summary) => InteractOutcome::Completed(summary),
            Err(_) => {
                debug!(%id, "collaborator dropped without reporting");
                std::future::pending().await
            }
        }
    }

    /// Sends the single terminal entry for this task, acked so bytes and
    /// counters are folded in before the task future resolves.
    async fn record(
        &self,
        task: &TaskDescriptor,
        status: LogStatus,
        duration_ms: Option<u64>,
        interaction_summary: Option<InteractionCounts>,
        bytes: u64,
        message: String,
    ) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            kind: task.kind.into(),
            target: Some(task.target.clone()),
            duration_ms,
            interaction_summary,
            bytes_estimated: bytes,
            status,
            message,
        };
        self.telemetry.record_task(entry, task.kind, bytes).await;
    }
}

/// Only http and https targets are dispatched.
fn valid_target(target: &str) -> bool {
    match url::Url::parse(target) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

fn success_message(task: &TaskDescriptor) -> String {
    match task.kind {
        TaskKind::Search => format!(
            "searched {} for \"{}\"",
            task.search_engine.as_deref().unwrap_or("the web"),
            task.search_query.as_deref().unwrap_or_default()
        ),
        TaskKind::Browse => format!("browsed {}", task.target),
        TaskKind::AdClick => format!("ad click on {}", task.target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::LogKind;
    use crate::host::HostError;
    use crate::store::MemoryStore;
    use crate::telemetry::{TelemetryDaemon, TelemetryReader};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use tokio_util::sync::CancellationToken;

    const GRACE: Duration = Duration::from_millis(100);
    const RETRY_DELAY: Duration = Duration::from_millis(20);
    const FALLBACK_BYTES: u64 = 5_000;

    enum Behavior {
        Complete { after: Duration },
        NeverReplies,
        NoCollaborator,
        RaceThenComplete,
        AlwaysRace,
        OpenFails,
    }

    struct FakeHost {
        behavior: Behavior,
        opens: AtomicUsize,
        attaches: AtomicUsize,
        closes: AtomicUsize,
        next_id: AtomicU64,
        // Held so never-reply receivers stay open instead of erroring.
        parked: Mutex<Vec<oneshot::Sender<InteractionSummary>>>,
    }

    impl FakeHost {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                opens: AtomicUsize::new(0),
                attaches: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                parked: Mutex::new(Vec::new()),
            })
        }

        fn summary() -> InteractionSummary {
            InteractionSummary {
                scrolls: 5,
                clicks: 2,
                bytes_estimated: 42_000,
            }
        }

        fn complete_after(&self, after: Duration) -> oneshot::Receiver<InteractionSummary> {
            let (tx, rx) = oneshot::channel();
            tokio::spawn(async move {
                sleep(after).await;
                let _ = tx.send(Self::summary());
            });
            rx
        }
    }

    impl ResourceHost for FakeHost {
        async fn open(&self, _target: &str) -> Result<ResourceId, HostError> {
            if matches!(self.behavior, Behavior::OpenFails) {
                return Err(HostError::Open("refused".to_string()));
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst)))
        }

        async fn close(&self, _id: ResourceId) -> Result<(), HostError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn begin_interaction(
            &self,
            _id: ResourceId,
            _request: InteractionRequest,
        ) -> Result<oneshot::Receiver<InteractionSummary>, AttachError> {
            let attempt = self.attaches.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Complete { after } => Ok(self.complete_after(*after)),
                Behavior::NeverReplies => {
                    let (tx, rx) = oneshot::channel();
                    self.parked.lock().unwrap().push(tx);
                    Ok(rx)
                }
                Behavior::NoCollaborator => Err(AttachError::NoCollaborator),
                Behavior::RaceThenComplete => {
                    if attempt == 0 {
                        Err(AttachError::HandoffRace)
                    } else {
                        Ok(self.complete_after(Duration::from_millis(10)))
                    }
                }
                Behavior::AlwaysRace => Err(AttachError::HandoffRace),
                Behavior::OpenFails => unreachable!("open never succeeds"),
            }
        }
    }

    struct Fixture {
        executor: TaskExecutor<FakeHost>,
        host: Arc<FakeHost>,
        reader: TelemetryReader,
        registry: Arc<ResourceRegistry>,
        _status_tx: watch::Sender<EngineStatus>,
        _shutdown: CancellationToken,
    }

    async fn fixture(behavior: Behavior, status: EngineStatus) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let (daemon, telemetry, reader) = TelemetryDaemon::load(store, 50).await;
        let shutdown = CancellationToken::new();
        tokio::spawn(daemon.run(shutdown.clone()));

        let host = FakeHost::new(behavior);
        let registry = Arc::new(ResourceRegistry::new());
        let (status_tx, status_rx) = watch::channel(status);
        let executor = TaskExecutor::new(
            Arc::clone(&host),
            telemetry,
            Arc::clone(&registry),
            status_rx,
            ExecutorConfig {
                grace: GRACE,
                handoff_retry_delay: RETRY_DELAY,
                fallback_bytes: FALLBACK_BYTES,
            },
        );

        Fixture {
            executor,
            host,
            reader,
            registry,
            _status_tx: status_tx,
            _shutdown: shutdown,
        }
    }

    fn task(budget: Duration) -> TaskDescriptor {
        TaskDescriptor {
            kind: TaskKind::Browse,
            target: "https://example.com".to_string(),
            duration_budget: budget,
            scheduled_offset: Duration::ZERO,
            search_engine: None,
            search_query: None,
        }
    }

    #[tokio::test]
    async fn completed_interaction_records_success() {
        let f = fixture(
            Behavior::Complete {
                after: Duration::from_millis(10),
            },
            EngineStatus::Running,
        )
        .await;

        f.executor.run(task(Duration::from_millis(500))).await;

        let logs = f.reader.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Success);
        assert_eq!(logs[0].bytes_estimated, 42_000);
        assert_eq!(
            logs[0].interaction_summary,
            Some(InteractionCounts {
                scrolls: 5,
                clicks: 2
            })
        );
        assert_eq!(f.host.closes.load(Ordering::SeqCst), 1);
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn never_replying_collaborator_times_out_at_budget_plus_grace() {
        let f = fixture(Behavior::NeverReplies, EngineStatus::Running).await;
        let budget = Duration::from_millis(150);

        let started = Instant::now();
        f.executor.run(task(budget)).await;
        let elapsed = started.elapsed();

        let deadline = budget + GRACE;
        assert!(elapsed >= deadline, "reaped early at {elapsed:?}");
        assert!(
            elapsed < deadline + Duration::from_millis(300),
            "reaped late at {elapsed:?}"
        );

        let logs = f.reader.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Timeout);
        assert_eq!(logs[0].bytes_estimated, 0);
        assert!(logs[0].interaction_summary.is_none());
        // The resource was still force-closed.
        assert_eq!(f.host.closes.load(Ordering::SeqCst), 1);
        assert!(f.registry.is_empty());

        // Counters advance on the timeout path too.
        let snapshot = f.reader.snapshot().await;
        assert_eq!(snapshot.stats.totals.browse, 1);
    }

    #[tokio::test]
    async fn attach_failure_degrades_to_zero_interaction_success() {
        let f = fixture(Behavior::NoCollaborator, EngineStatus::Running).await;
        let budget = Duration::from_millis(100);

        let started = Instant::now();
        f.executor.run(task(budget)).await;
        let elapsed = started.elapsed();

        // The budget is waited out rather than returning immediately.
        assert!(elapsed >= budget, "returned early at {elapsed:?}");

        let logs = f.reader.logs().await;
        assert_eq!(logs[0].status, LogStatus::Success);
        assert_eq!(logs[0].bytes_estimated, FALLBACK_BYTES);
        assert_eq!(logs[0].interaction_summary, Some(InteractionCounts::default()));
    }

    #[tokio::test]
    async fn handoff_race_gets_exactly_one_retry() {
        let f = fixture(Behavior::RaceThenComplete, EngineStatus::Running).await;

        f.executor.run(task(Duration::from_millis(500))).await;

        assert_eq!(f.host.attaches.load(Ordering::SeqCst), 2);
        let logs = f.reader.logs().await;
        assert_eq!(logs[0].status, LogStatus::Success);
    }

    #[tokio::test]
    async fn persistent_handoff_race_degrades_to_timeout() {
        let f = fixture(Behavior::AlwaysRace, EngineStatus::Running).await;

        f.executor.run(task(Duration::from_millis(100))).await;

        // One retry, then the task is left to its timeout.
        assert_eq!(f.host.attaches.load(Ordering::SeqCst), 2);
        let logs = f.reader.logs().await;
        assert_eq!(logs[0].status, LogStatus::Timeout);
        assert_eq!(f.host.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_failure_records_resource_failed_without_retry() {
        let f = fixture(Behavior::OpenFails, EngineStatus::Running).await;

        f.executor.run(task(Duration::from_millis(100))).await;

        let logs = f.reader.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::ResourceFailed);
        assert_eq!(logs[0].bytes_estimated, 0);
        assert_eq!(logs[0].interaction_summary, Some(InteractionCounts::default()));
        assert_eq!(f.host.closes.load(Ordering::SeqCst), 0);
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn invalid_target_is_skipped_with_a_system_note() {
        let f = fixture(Behavior::NoCollaborator, EngineStatus::Running).await;

        let mut bad = task(Duration::from_millis(100));
        bad.target = "ftp://example.com/file".to_string();
        f.executor.run(bad).await;

        let logs = f.reader.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, LogKind::System);
        assert_eq!(logs[0].status, LogStatus::Info);
        assert!(logs[0].message.contains("invalid target"));
        // Skips never touch the host or the counters.
        assert_eq!(f.host.opens.load(Ordering::SeqCst), 0);
        assert_eq!(f.reader.snapshot().await.stats.totals.total, 0);
    }

    #[tokio::test]
    async fn stopped_engine_drops_the_task_silently() {
        let f = fixture(Behavior::NoCollaborator, EngineStatus::Stopped).await;

        f.executor.run(task(Duration::from_millis(100))).await;

        assert!(f.reader.logs().await.is_empty());
        assert_eq!(f.host.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registry_drain_takes_every_open_resource_once() {
        let registry = ResourceRegistry::new();
        registry.insert(ResourceId(1), TaskKind::Browse);
        registry.insert(ResourceId(2), TaskKind::Search);

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        // A later executor-side removal finds nothing to close.
        assert!(!registry.remove(ResourceId(1)));
    }
}
