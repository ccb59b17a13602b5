//! Task completion counters: per-day, all-time, and active-day keys.
//!
//! Persisted wholesale as the `stats` section. Counters bump on every
//! terminal task path (success, timeout, resourceFailed); invalid-target
//! skips never started and are not counted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bandwidth::day_key;
use crate::task::TaskKind;

/// Per-kind counters with a running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindCounters {
    pub search: u64,
    pub browse: u64,
    pub ad_click: u64,
    pub total: u64,
}

impl KindCounters {
    fn bump(&mut self, kind: TaskKind) {
        match kind {
            TaskKind::Search => self.search += 1,
            TaskKind::Browse => self.browse += 1,
            TaskKind::AdClick => self.ad_click += 1,
        }
        self.total += 1;
    }
}

/// All-time totals, bounded per-day counters, and the set of day keys with
/// any activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub totals: KindCounters,
    pub daily: BTreeMap<String, KindCounters>,
    pub active_days: BTreeSet<String>,
    // Not persisted; restore() reapplies it after deserialization.
    #[serde(skip)]
    daily_capacity: usize,
}

impl TaskStats {
    pub fn new(daily_capacity: usize) -> Self {
        Self {
            daily_capacity,
            ..Self::default()
        }
    }

    /// Restores persisted stats, trimming the daily map to capacity.
    pub fn restore(mut self, daily_capacity: usize) -> Self {
        self.daily_capacity = daily_capacity;
        self.evict();
        self
    }

    /// Counts one terminal task of `kind` on the day containing `at`.
    pub fn record(&mut self, kind: TaskKind, at: DateTime<Utc>) {
        let day = day_key(at);
        self.totals.bump(kind);
        self.daily.entry(day.clone()).or_default().bump(kind);
        self.active_days.insert(day);
        self.evict();
    }

    fn evict(&mut self) {
        while self.daily.len() > self.daily_capacity.max(1) {
            self.daily.pop_first();
        }
    }

    /// Counters for the day containing `at`, zeroed when absent.
    pub fn day_counters(&self, at: DateTime<Utc>) -> KindCounters {
        self.daily.get(&day_key(at)).copied().unwrap_or_default()
    }

    pub fn days_active(&self) -> usize {
        self.active_days.len()
    }
}
