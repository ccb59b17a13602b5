//! Task generation.
//!
//! Turns the current settings and the catalog into concrete
//! [`TaskDescriptor`]s. Selection is a pure function of the injected RNG, so
//! tests drive it with a seeded generator.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::catalog::{Catalog, Destination, SearchEngine};
use crate::defaults::duration_range_ms;
use crate::random::{uniform_choice, weighted_choice};
use crate::settings::{EngineSettings, TaskMixWeights};
use crate::task::{TaskDescriptor, TaskKind};

/// Builds decoy tasks from the catalog according to the task mix, engine,
/// and category settings in force at build time.
pub struct TaskGenerator {
    catalog: Catalog,
}

impl TaskGenerator {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Builds one task scheduled at `offset` from its tick boundary.
    pub fn build_task<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        settings: &EngineSettings,
        offset: Duration,
    ) -> TaskDescriptor {
        match self.next_task_kind(rng, settings) {
            TaskKind::Search => self.build_search(rng, settings, offset),
            TaskKind::Browse => self.build_browse(rng, settings, offset),
            TaskKind::AdClick => self.build_ad_click(rng, offset),
        }
    }

    /// Draws the task kind from the configured mix.
    ///
    /// Writes validate the mix, but a hand-edited state file can still carry
    /// an unusable one; that falls back to the default mix rather than panic.
    fn next_task_kind<R: Rng + ?Sized>(&self, rng: &mut R, settings: &EngineSettings) -> TaskKind {
        const KINDS: [TaskKind; 3] = [TaskKind::Search, TaskKind::Browse, TaskKind::AdClick];
        let weights = if settings.task_weights.validate().is_ok() {
            settings.task_weights
        } else {
            TaskMixWeights::default()
        };
        *weighted_choice(rng, &KINDS, |kind| weights.weight_for(*kind))
    }

    fn build_search<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        settings: &EngineSettings,
        offset: Duration,
    ) -> TaskDescriptor {
        let candidates = self.effective_engines(settings);
        if candidates.is_empty() {
            debug!("no search engine enabled, substituting a browse task");
            return self.build_browse(rng, settings, offset);
        }

        let (engine, _) = weighted_choice(rng, &candidates, |(_, weight)| *weight);
        let query = uniform_choice(rng, &self.catalog.queries);
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let target = engine.url_template.replace("{query}", &encoded);

        TaskDescriptor {
            kind: TaskKind::Search,
            target,
            duration_budget: self.draw_duration(rng, TaskKind::Search),
            scheduled_offset: offset,
            search_engine: Some(engine.id.clone()),
            search_query: Some(query.clone()),
        }
    }

    fn build_browse<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        settings: &EngineSettings,
        offset: Duration,
    ) -> TaskDescriptor {
        let mut candidates: Vec<&Destination> = self
            .catalog
            .destinations
            .iter()
            .filter(|dest| settings.category_enabled(&dest.category))
            .collect();
        if candidates.is_empty() {
            // Disabling every category falls back to the full catalog so the
            // mix keeps producing browse traffic.
            debug!("all categories disabled, drawing from the full catalog");
            candidates = self.catalog.destinations.iter().collect();
        }

        let destination = uniform_choice(rng, &candidates);
        TaskDescriptor {
            kind: TaskKind::Browse,
            target: destination.url.clone(),
            duration_budget: self.draw_duration(rng, TaskKind::Browse),
            scheduled_offset: offset,
            search_engine: None,
            search_query: None,
        }
    }

    fn build_ad_click<R: Rng + ?Sized>(&self, rng: &mut R, offset: Duration) -> TaskDescriptor {
        let target = uniform_choice(rng, &self.catalog.ad_destinations).clone();
        TaskDescriptor {
            kind: TaskKind::AdClick,
            target,
            duration_budget: self.draw_duration(rng, TaskKind::AdClick),
            scheduled_offset: offset,
            search_engine: None,
            search_query: None,
        }
    }

    /// Engines eligible for selection: enabled (override or catalog default)
    /// with a strictly positive effective weight.
    fn effective_engines(&self, settings: &EngineSettings) -> Vec<(&SearchEngine, f64)> {
        self.catalog
            .search_engines
            .iter()
            .filter_map(|engine| {
                let (enabled, weight) = match settings.engines.get(&engine.id) {
                    Some(over) => (over.enabled, over.weight),
                    None => (true, engine.default_weight),
                };
                (enabled && weight > 0.0).then_some((engine, weight))
            })
            .collect()
    }

    fn draw_duration<R: Rng + ?Sized>(&self, rng: &mut R, kind: TaskKind) -> Duration {
        Duration::from_millis(rng.gen_range(duration_range_ms(kind)))
    }
}
