//! Rolling bandwidth accounting.
//!
//! Bytes fold into UTC calendar buckets: hour keys (`%Y-%m-%dT%H`, most
//! recent 24 kept) and day keys (`%Y-%m-%d`, most recent 30 kept). Buckets
//! are boundary-aligned, not a sliding window: a byte recorded at 13:59
//! belongs wholly to the 13:00 bucket. The session counter is in-memory only
//! and resets on every engine start.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Formats the hour bucket key for an instant.
pub fn hour_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H").to_string()
}

/// Formats the day bucket key for an instant.
pub fn day_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Hour/day byte buckets plus the session counter.
///
/// Zero-padded keys sort lexicographically in chronological order, so the
/// `BTreeMap`s' first entries are the oldest and eviction pops from the
/// front.
#[derive(Debug, Default)]
pub struct BandwidthAggregator {
    hourly: BTreeMap<String, u64>,
    daily: BTreeMap<String, u64>,
    session_bytes: u64,
    hourly_capacity: usize,
    daily_capacity: usize,
}

impl BandwidthAggregator {
    pub fn new(hourly_capacity: usize, daily_capacity: usize) -> Self {
        Self {
            hourly: BTreeMap::new(),
            daily: BTreeMap::new(),
            session_bytes: 0,
            hourly_capacity,
            daily_capacity,
        }
    }

    /// Restores buckets from their persisted form, trimming to capacity.
    pub fn from_buckets(
        hourly: BTreeMap<String, u64>,
        daily: BTreeMap<String, u64>,
        hourly_capacity: usize,
        daily_capacity: usize,
    ) -> Self {
        let mut aggregator = Self::new(hourly_capacity, daily_capacity);
        aggregator.hourly = hourly;
        aggregator.daily = daily;
        aggregator.evict();
        aggregator
    }

    /// Adds `bytes` to the session counter and to the buckets containing
    /// `at`, then evicts buckets beyond the retention capacities.
    pub fn record(&mut self, bytes: u64, at: DateTime<Utc>) {
        self.session_bytes = self.session_bytes.saturating_add(bytes);
        *self.hourly.entry(hour_key(at)).or_insert(0) += bytes;
        *self.daily.entry(day_key(at)).or_insert(0) += bytes;
        self.evict();
    }

    fn evict(&mut self) {
        while self.hourly.len() > self.hourly_capacity {
            self.hourly.pop_first();
        }
        while self.daily.len() > self.daily_capacity {
            self.daily.pop_first();
        }
    }

    /// Zeroes the session counter. Buckets are unaffected.
    pub fn reset_session(&mut self) {
        self.session_bytes = 0;
    }

    pub fn session_bytes(&self) -> u64 {
        self.session_bytes
    }

    pub fn hourly(&self) -> &BTreeMap<String, u64> {
        &self.hourly
    }

    pub fn daily(&self) -> &BTreeMap<String, u64> {
        &self.daily
    }
}
