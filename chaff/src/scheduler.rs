//! Tick-driven task scheduling.
//!
//! Each tick window gets one batch of Poisson-distributed arrivals built
//! ahead of time. When the tick fires, the due batch's entries are handed to
//! independent per-entry timers and the next batch is built immediately, so
//! dispatch and planning never block each other.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::executor::TaskExecutor;
use crate::generator::TaskGenerator;
use crate::host::ResourceHost;
use crate::random::sample_inter_arrival;
use crate::settings::EngineSettings;
use crate::task::PendingBatch;

/// Upper bound on tasks planned per tick. The intensity presets stay far
/// below this; it exists so batch construction terminates for any rate.
const MAX_BATCH_TASKS: usize = 1_000;

/// Builds one tick window of arrivals: inter-arrival times accumulate from
/// zero and every arrival landing inside the window becomes a task at that
/// offset. The expected batch size is the intensity's lambda per tick.
pub(crate) fn build_batch<R: Rng + ?Sized>(
    rng: &mut R,
    generator: &TaskGenerator,
    settings: &EngineSettings,
    tick_period: Duration,
) -> PendingBatch {
    let period_secs = tick_period.as_secs_f64();
    let rate_per_second = settings.intensity.lambda_per_tick() / period_secs;

    let mut batch = PendingBatch::default();
    let mut elapsed = sample_inter_arrival(rng, rate_per_second);
    while elapsed < period_secs && batch.len() < MAX_BATCH_TASKS {
        let offset = Duration::from_secs_f64(elapsed);
        batch.push(generator.build_task(rng, settings, offset));
        elapsed += sample_inter_arrival(rng, rate_per_second);
    }
    batch
}

/// Owns the recurring tick and the pending batch. One scheduler exists per
/// engine run; stop cancels it and a fresh one is built on the next start.
pub struct Scheduler<H: ResourceHost> {
    tick_period: Duration,
    generator: TaskGenerator,
    settings: Arc<RwLock<EngineSettings>>,
    executor: Arc<TaskExecutor<H>>,
    rng: StdRng,
    pending: PendingBatch,
}

impl<H: ResourceHost> Scheduler<H> {
    pub fn new(
        tick_period: Duration,
        generator: TaskGenerator,
        settings: Arc<RwLock<EngineSettings>>,
        executor: Arc<TaskExecutor<H>>,
    ) -> Self {
        Self {
            tick_period,
            generator,
            settings,
            executor,
            rng: StdRng::from_entropy(),
            pending: PendingBatch::default(),
        }
    }

    /// Builds the first batch and services ticks until cancelled.
    ///
    /// Cancellation discards the pending batch and any timers still waiting
    /// on their offset; tasks whose timer already fired run to their own
    /// completion or timeout.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let settings = self.settings.read().await.clone();
        self.pending = build_batch(&mut self.rng, &self.generator, &settings, self.tick_period);
        info!(
            tasks = self.pending.len(),
            period_secs = self.tick_period.as_secs_f64(),
            "scheduler started"
        );

        let mut tick = interval_at(Instant::now() + self.tick_period, self.tick_period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = tick.tick() => self.on_tick(&shutdown).await,
            }
        }

        debug!(undispatched = self.pending.len(), "scheduler stopped");
    }

    /// Dispatches the due batch to per-entry timers and plans the next one.
    async fn on_tick(&mut self, shutdown: &CancellationToken) {
        let due = self.pending.take();
        let settings = self.settings.read().await.clone();
        self.pending = build_batch(&mut self.rng, &self.generator, &settings, self.tick_period);
        debug!(due = due.len(), planned = self.pending.len(), "tick");

        for task in due {
            let executor = Arc::clone(&self.executor);
            let cancel = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    biased;

                    // Cancellation only wins while the timer is pending; a
                    // task whose timer fired runs to its own terminal state.
                    _ = cancel.cancelled() => {}

                    _ = sleep(task.scheduled_offset) => executor.run(task).await,
                }
            });
        }
    }
}
