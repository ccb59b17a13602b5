//! Engine lifecycle control.
//!
//! One [`Engine`] instance owns the scheduler, the executor, and the
//! telemetry daemon. The persisted `running` flag is the source of truth for
//! lifecycle state: the host process may be restarted at any time, so every
//! external entry point reconciles in-memory state against the flag before
//! acting, and reconciliation is idempotent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::eventlog::LogEntry;
use crate::executor::{EngineStatus, ExecutorConfig, ResourceRegistry, TaskExecutor};
use crate::generator::TaskGenerator;
use crate::host::ResourceHost;
use crate::protocol::{BandwidthReport, Request, Response, SettingsReport, StatsReport, StatusReport};
use crate::scheduler::Scheduler;
use crate::settings::{
    validate_engine_weights, CategorySettings, EngineSettings, EngineSettingsMap, EngineWeight,
    IntensityLevel, SettingsError, TaskMixWeights,
};
use crate::store::{self, StateKey, StateStore, StoreError};
use crate::telemetry::{TelemetryClient, TelemetryDaemon, TelemetryReader};

/// Failures surfaced to protocol clients.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),
}

struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// The single logical engine instance.
pub struct Engine<H: ResourceHost, S: StateStore> {
    store: Arc<S>,
    host: Arc<H>,
    config: EngineConfig,
    settings: Arc<RwLock<EngineSettings>>,
    status_tx: watch::Sender<EngineStatus>,
    telemetry: TelemetryClient,
    reader: TelemetryReader,
    registry: Arc<ResourceRegistry>,
    executor: Arc<TaskExecutor<H>>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    // Serializes start/stop/reconcile so only one transition runs at a time.
    transition: Mutex<()>,
    session_start: RwLock<Option<DateTime<Utc>>>,
    telemetry_shutdown: CancellationToken,
    telemetry_join: Mutex<Option<JoinHandle<()>>>,
}

impl<H: ResourceHost, S: StateStore> Engine<H, S> {
    /// Seeds settings and telemetry from the store and spawns the telemetry
    /// daemon. The engine comes up Stopped; the host is expected to call
    /// [`Engine::reconcile`] to pick up a persisted running state.
    pub async fn load(store: S, host: H, config: EngineConfig) -> Self {
        let store = Arc::new(store);
        let host = Arc::new(host);

        let (daemon, telemetry, reader) =
            TelemetryDaemon::load(Arc::clone(&store), config.log_capacity).await;
        let telemetry_shutdown = CancellationToken::new();
        let telemetry_join = tokio::spawn(daemon.run(telemetry_shutdown.clone()));

        let settings = Arc::new(RwLock::new(EngineSettings::load(&*store).await));
        let session_start = store::read_value(&*store, StateKey::SessionStart).await;

        let (status_tx, status_rx) = watch::channel(EngineStatus::Stopped);
        let registry = Arc::new(ResourceRegistry::new());
        let executor = Arc::new(TaskExecutor::new(
            Arc::clone(&host),
            telemetry.clone(),
            Arc::clone(&registry),
            status_rx,
            ExecutorConfig::from(&config),
        ));

        Self {
            store,
            host,
            config,
            settings,
            status_tx,
            telemetry,
            reader,
            registry,
            executor,
            scheduler: Mutex::new(None),
            transition: Mutex::new(()),
            session_start: RwLock::new(session_start),
            telemetry_shutdown,
            telemetry_join: Mutex::new(Some(telemetry_join)),
        }
    }

    /// Dispatches one protocol request. Reconciles first, since the host may
    /// have discarded in-memory state since the previous request.
    pub async fn handle_request(&self, request: Request) -> Response {
        self.reconcile().await;

        match request {
            Request::Start => ack(self.start().await),
            Request::Stop => ack(self.stop().await),
            Request::SetIntensity { level } => ack(self.set_intensity(level).await),
            Request::SetEngines { engines } => ack(self.set_engines(engines).await),
            Request::SetTaskWeights { weights } => ack(self.set_task_weights(weights).await),
            Request::SetCategories { categories } => ack(self.set_categories(categories).await),
            Request::GetStatus => Response::status(self.status().await),
            Request::GetLogs => Response::logs(self.logs().await),
            Request::GetBandwidth => Response::bandwidth(self.bandwidth().await),
            Request::GetSettings => Response::settings(self.settings_report().await),
            Request::ClearLogs => {
                self.clear_logs().await;
                Response::ok()
            }
        }
    }

    /// Aligns in-memory lifecycle state with the persisted running flag.
    ///
    /// Idempotent and safe to call any number of times. A persisted running
    /// flag with a stopped in-memory engine means the host discarded state;
    /// scheduling resumes without a fresh "started" entry, leaving exactly
    /// one system note for the whole outage.
    pub async fn reconcile(&self) {
        let _guard = self.transition.lock().await;
        self.reconcile_locked().await;
    }

    async fn reconcile_locked(&self) {
        let persisted: bool = store::read_or_default(&*self.store, StateKey::Running).await;
        let running = self.is_running();

        if persisted && !running {
            let _ = self.status_tx.send(EngineStatus::Running);
            self.spawn_scheduler().await;
            self.telemetry
                .note(LogEntry::system(
                    Utc::now(),
                    "resumed noise generation from persisted state",
                ))
                .await;
            info!("reconciled persisted running state, scheduling resumed");
        } else if running {
            self.ensure_scheduler().await;
        }
    }

    /// Starts noise generation. Reconciles first, so a persisted running
    /// state resumes instead of starting a fresh session. A no-op when
    /// already running.
    pub async fn start(&self) -> Result<(), EngineError> {
        let _guard = self.transition.lock().await;
        self.reconcile_locked().await;
        self.start_locked().await
    }

    async fn start_locked(&self) -> Result<(), EngineError> {
        if self.is_running() {
            debug!("start requested while already running");
            return Ok(());
        }

        store::write_value(&*self.store, StateKey::Running, &true).await?;
        let now = Utc::now();
        store::write_value(&*self.store, StateKey::SessionStart, &now).await?;
        *self.session_start.write().await = Some(now);
        self.telemetry.begin_session().await;

        let intensity = self.settings.read().await.intensity;
        self.telemetry
            .note(LogEntry::system(
                now,
                format!("noise generation started ({intensity} intensity)"),
            ))
            .await;

        let _ = self.status_tx.send(EngineStatus::Running);
        self.spawn_scheduler().await;
        info!(%intensity, "engine started");
        Ok(())
    }

    /// Stops noise generation and force-closes every resource still open
    /// from in-flight tasks. Reconciles first, so stopping a persisted
    /// running state after a host restart stops the resumed engine rather
    /// than no-oping. A no-op when already stopped.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let _guard = self.transition.lock().await;
        self.reconcile_locked().await;
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> Result<(), EngineError> {
        if !self.is_running() {
            debug!("stop requested while already stopped");
            return Ok(());
        }

        store::write_value(&*self.store, StateKey::Running, &false).await?;
        let _ = self.status_tx.send(EngineStatus::Stopped);

        if let Some(handle) = self.scheduler.lock().await.take() {
            handle.cancel.cancel();
            if let Err(error) = handle.join.await {
                warn!(%error, "scheduler task failed during stop");
            }
        }

        let ids = self.registry.drain();
        let closed = ids.len();
        for id in ids {
            if let Err(error) = self.host.close(id).await {
                debug!(%id, %error, "failed to close resource during stop sweep");
            }
        }

        let session_bytes = self.reader.session_bytes().await;
        self.telemetry
            .note(LogEntry::system(
                Utc::now(),
                format!(
                    "noise generation stopped ({closed} resources closed, \
                     {session_bytes} bytes this session)"
                ),
            ))
            .await;
        info!(closed, session_bytes, "engine stopped");
        Ok(())
    }

    pub async fn set_intensity(&self, level: IntensityLevel) -> Result<(), EngineError> {
        store::write_value(&*self.store, StateKey::Intensity, &level).await?;
        self.settings.write().await.intensity = level;
        info!(%level, "intensity updated");
        Ok(())
    }

    pub async fn set_engines(&self, engines: EngineSettingsMap) -> Result<(), EngineError> {
        validate_engine_weights(&engines)?;
        store::write_value(&*self.store, StateKey::EngineSettings, &engines).await?;
        self.settings.write().await.engines = engines;
        info!("search engine settings updated");
        Ok(())
    }

    pub async fn set_task_weights(&self, weights: TaskMixWeights) -> Result<(), EngineError> {
        weights.validate()?;
        store::write_value(&*self.store, StateKey::TaskWeights, &weights).await?;
        self.settings.write().await.task_weights = weights;
        info!("task mix updated");
        Ok(())
    }

    pub async fn set_categories(&self, categories: CategorySettings) -> Result<(), EngineError> {
        store::write_value(&*self.store, StateKey::CategorySettings, &categories).await?;
        self.settings.write().await.categories = categories;
        info!("category settings updated");
        Ok(())
    }

    pub async fn status(&self) -> StatusReport {
        let snapshot = self.reader.snapshot().await;
        let now = Utc::now();
        StatusReport {
            running: self.is_running(),
            intensity: self.settings.read().await.intensity,
            stats: StatsReport {
                totals: snapshot.stats.totals,
                today: snapshot.stats.day_counters(now),
                days_active: snapshot.stats.days_active(),
            },
            session_bandwidth: snapshot.session_bytes,
            session_start: *self.session_start.read().await,
        }
    }

    /// Activity log entries, most recent first.
    pub async fn logs(&self) -> Vec<LogEntry> {
        self.reader.logs().await
    }

    pub async fn bandwidth(&self) -> BandwidthReport {
        let snapshot = self.reader.snapshot().await;
        BandwidthReport {
            hourly: snapshot.hourly,
            daily: snapshot.daily,
            session: snapshot.session_bytes,
        }
    }

    /// Effective settings: the catalog defaults overlaid with the user's
    /// overrides, covering every engine and category the catalog knows.
    pub async fn settings_report(&self) -> SettingsReport {
        let settings = self.settings.read().await.clone();

        let mut engines = EngineSettingsMap::new();
        for engine in &self.config.catalog.search_engines {
            let effective = settings
                .engines
                .get(&engine.id)
                .copied()
                .unwrap_or(EngineWeight {
                    enabled: true,
                    weight: engine.default_weight,
                });
            engines.insert(engine.id.clone(), effective);
        }

        let mut categories = CategorySettings::new();
        for category in self.config.catalog.category_ids() {
            let enabled = settings.category_enabled(&category);
            categories.insert(category, enabled);
        }

        SettingsReport {
            engines,
            task_weights: settings.task_weights,
            categories,
        }
    }

    /// Empties the activity log, leaving a single system note.
    pub async fn clear_logs(&self) {
        self.telemetry.clear_logs().await;
    }

    /// Tears down background tasks for host shutdown. Deliberately leaves
    /// the persisted running flag untouched so the next boot reconciles back
    /// into the running state.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.scheduler.lock().await.take() {
            handle.cancel.cancel();
            let _ = handle.join.await;
        }
        let _ = self.status_tx.send(EngineStatus::Stopped);

        for id in self.registry.drain() {
            let _ = self.host.close(id).await;
        }

        self.telemetry_shutdown.cancel();
        if let Some(join) = self.telemetry_join.lock().await.take() {
            let _ = join.await;
        }
        info!("engine shut down");
    }

    fn is_running(&self) -> bool {
        *self.status_tx.borrow() == EngineStatus::Running
    }

    /// Replaces the scheduler handle, cancelling any stale one first.
    async fn spawn_scheduler(&self) {
        let mut slot = self.scheduler.lock().await;
        if let Some(stale) = slot.take() {
            stale.cancel.cancel();
        }
        *slot = Some(self.new_scheduler_handle());
    }

    /// Recreates the recurring tick if the scheduler task is gone.
    async fn ensure_scheduler(&self) {
        let mut slot = self.scheduler.lock().await;
        let alive = slot
            .as_ref()
            .map(|handle| !handle.join.is_finished())
            .unwrap_or(false);
        if !alive {
            warn!("recurring tick missing while running, recreating");
            *slot = Some(self.new_scheduler_handle());
        }
    }

    fn new_scheduler_handle(&self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            self.config.tick_period,
            TaskGenerator::new(self.config.catalog.clone()),
            Arc::clone(&self.settings),
            Arc::clone(&self.executor),
        );
        SchedulerHandle {
            cancel: cancel.clone(),
            join: tokio::spawn(scheduler.run(cancel)),
        }
    }
}

fn ack(result: Result<(), EngineError>) -> Response {
    match result {
        Ok(()) => Response::ok(),
        Err(error) => Response::error(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::{LogKind, LogStatus};
    use crate::host::{
        AttachError, HostError, InteractionRequest, InteractionSummary, ResourceId,
    };
    use crate::store::MemoryStore;
    use tokio::sync::oneshot;

    /// Host that opens successfully but has no collaborator. Engine unit
    /// tests never let a task reach dispatch anyway (60 s tick period).
    struct NoopHost;

    impl ResourceHost for NoopHost {
        async fn open(&self, _target: &str) -> Result<ResourceId, HostError> {
            Ok(ResourceId(1))
        }

        async fn close(&self, _id: ResourceId) -> Result<(), HostError> {
            Ok(())
        }

        async fn begin_interaction(
            &self,
            _id: ResourceId,
            _request: InteractionRequest,
        ) -> Result<oneshot::Receiver<InteractionSummary>, AttachError> {
            Err(AttachError::NoCollaborator)
        }
    }

    async fn engine() -> Engine<NoopHost, MemoryStore> {
        Engine::load(MemoryStore::new(), NoopHost, EngineConfig::default()).await
    }

    #[tokio::test]
    async fn start_persists_the_flag_and_logs_one_entry() {
        let engine = engine().await;
        engine.start().await.unwrap();

        let status = engine.status().await;
        assert!(status.running);
        assert!(status.session_start.is_some());

        let persisted: bool = store::read_or_default(&*engine.store, StateKey::Running).await;
        assert!(persisted);

        let logs = engine.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, LogKind::System);
        assert!(logs[0].message.contains("started (medium intensity)"));

        // Starting again is a no-op and logs nothing new.
        engine.start().await.unwrap();
        assert_eq!(engine.logs().await.len(), 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn stop_persists_the_flag_and_summarizes() {
        let engine = engine().await;
        engine.start().await.unwrap();
        engine.stop().await.unwrap();

        let status = engine.status().await;
        assert!(!status.running);

        let persisted: bool = store::read_or_default(&*engine.store, StateKey::Running).await;
        assert!(!persisted);

        let logs = engine.logs().await;
        assert_eq!(logs.len(), 2);
        assert!(logs[0].message.contains("stopped (0 resources closed"));

        // Stopping again changes nothing.
        engine.stop().await.unwrap();
        assert_eq!(engine.logs().await.len(), 2);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn reconcile_resumes_a_persisted_running_state_once() {
        let store = MemoryStore::new();
        store::write_value(&store, StateKey::Running, &true)
            .await
            .unwrap();

        let engine = Engine::load(store, NoopHost, EngineConfig::default()).await;
        assert!(!engine.status().await.running);

        engine.reconcile().await;
        assert!(engine.status().await.running);
        let logs = engine.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Info);
        assert!(logs[0].message.contains("resumed"));

        // Second reconcile is a no-op: same single entry, same state.
        engine.reconcile().await;
        assert!(engine.status().await.running);
        assert_eq!(engine.logs().await.len(), 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn reconcile_with_nothing_persisted_stays_stopped() {
        let engine = engine().await;
        engine.reconcile().await;
        assert!(!engine.status().await.running);
        assert!(engine.logs().await.is_empty());

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn setters_validate_persist_and_apply() {
        let engine = engine().await;

        engine.set_intensity(IntensityLevel::High).await.unwrap();
        assert_eq!(engine.status().await.intensity, IntensityLevel::High);
        let persisted: IntensityLevel =
            store::read_or_default(&*engine.store, StateKey::Intensity).await;
        assert_eq!(persisted, IntensityLevel::High);

        let bad = TaskMixWeights {
            search: 0.0,
            browse: 0.0,
            ad_click: 0.0,
        };
        assert!(engine.set_task_weights(bad).await.is_err());
        // The rejected mix was neither persisted nor applied.
        let report = engine.settings_report().await;
        assert_eq!(report.task_weights, TaskMixWeights::default());

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn settings_report_covers_the_whole_catalog() {
        let engine = engine().await;

        let mut overrides = EngineSettingsMap::new();
        overrides.insert(
            "google".to_string(),
            EngineWeight {
                enabled: false,
                weight: 40.0,
            },
        );
        engine.set_engines(overrides).await.unwrap();

        let report = engine.settings_report().await;
        assert!(!report.engines["google"].enabled);
        // Untouched engines surface with catalog defaults.
        assert!(report.engines["bing"].enabled);
        assert_eq!(report.engines["bing"].weight, 25.0);
        // Every category is reported, enabled unless overridden.
        assert!(report.categories["news"]);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn clear_logs_via_protocol_leaves_one_note() {
        let engine = engine().await;
        engine.start().await.unwrap();

        let response = engine.handle_request(Request::ClearLogs).await;
        assert!(matches!(response, Response::Ack { ok: true }));

        let logs = engine.logs().await;
        assert_eq!(logs.len(), 1);
        assert!(logs[0].message.contains("cleared"));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn handle_request_reports_errors_as_protocol_errors() {
        let engine = engine().await;
        let response = engine
            .handle_request(Request::SetTaskWeights {
                weights: TaskMixWeights {
                    search: -1.0,
                    browse: 0.0,
                    ad_click: 0.0,
                },
            })
            .await;

        match response {
            Response::Error { error } => assert!(error.contains("invalid weight")),
            other => panic!("expected error, got {other:?}"),
        }

        engine.shutdown().await;
    }
}
