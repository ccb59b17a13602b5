//! Bounded, newest-first event log.
//!
//! A fixed-capacity ring over [`VecDeque`]: append pushes to the front and
//! truncates from the tail, so reads are always most-recent-first and the
//! oldest entry drops on overflow.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskKind;

/// Entry kind: the three task kinds plus engine-level system notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogKind {
    Search,
    Browse,
    AdClick,
    System,
}

impl From<TaskKind> for LogKind {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Search => LogKind::Search,
            TaskKind::Browse => LogKind::Browse,
            TaskKind::AdClick => LogKind::AdClick,
        }
    }
}

/// Terminal status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogStatus {
    Success,
    Timeout,
    ResourceFailed,
    Info,
}

/// Aggregate interaction counts reported by the collaborator. Byte counts
/// live on the entry itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCounts {
    pub scrolls: u32,
    pub clicks: u32,
}

/// One event log record, shared by persistence and the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_summary: Option<InteractionCounts>,
    pub bytes_estimated: u64,
    pub status: LogStatus,
    pub message: String,
}

impl LogEntry {
    /// Engine-level note: kind system, status info, no target or bytes.
    pub fn system(at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp: at,
            kind: LogKind::System,
            target: None,
            duration_ms: None,
            interaction_summary: None,
            bytes_estimated: 0,
            status: LogStatus::Info,
            message: message.into(),
        }
    }
}

/// Fixed-capacity, newest-first event ring.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl EventLog {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "event log capacity must be positive");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Restores a log from its persisted newest-first form, keeping at most
    /// `capacity` entries.
    pub fn from_entries(entries: Vec<LogEntry>, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        log.entries = entries.into_iter().take(capacity).collect();
        log
    }

    /// Push-front; the oldest entry falls off the tail at capacity.
    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Empties the buffer, then appends the provided system entry recording
    /// the clear.
    pub fn clear_with_note(&mut self, note: LogEntry) {
        self.entries.clear();
        self.entries.push_front(note);
    }

    /// Entries most-recent-first, cloned for the snapshot/persisted form.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Most-recent-first iteration without cloning.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(n: usize) -> LogEntry {
        LogEntry::system(Utc::now(), format!("note {n}"))
    }

    #[test]
    fn overflow_keeps_newest_entries_first() {
        let capacity = 10;
        let mut log = EventLog::new(capacity);
        for n in 0..capacity + 5 {
            log.append(note(n));
        }

        assert_eq!(log.len(), capacity);
        let entries = log.entries();
        // The five overflow appends are the newest and lead the list.
        assert_eq!(entries[0].message, "note 14");
        assert_eq!(entries[4].message, "note 10");
        // The oldest five dropped off the tail.
        assert_eq!(entries.last().unwrap().message, "note 5");
    }

    #[test]
    fn reads_are_most_recent_first() {
        let mut log = EventLog::new(4);
        log.append(note(1));
        log.append(note(2));

        let entries = log.entries();
        assert_eq!(entries[0].message, "note 2");
        assert_eq!(entries[1].message, "note 1");
    }

    #[test]
    fn clear_leaves_single_system_note() {
        let mut log = EventLog::new(8);
        for n in 0..5 {
            log.append(note(n));
        }

        log.clear_with_note(LogEntry::system(Utc::now(), "log cleared"));

        assert_eq!(log.len(), 1);
        let entry = &log.entries()[0];
        assert_eq!(entry.kind, LogKind::System);
        assert_eq!(entry.status, LogStatus::Info);
        assert_eq!(entry.message, "log cleared");
    }

    #[test]
    fn restores_from_persisted_form() {
        let mut log = EventLog::new(4);
        for n in 0..4 {
            log.append(note(n));
        }

        let restored = EventLog::from_entries(log.entries(), 4);
        assert_eq!(restored.entries(), log.entries());

        // A shrunken capacity keeps only the newest entries.
        let truncated = EventLog::from_entries(log.entries(), 2);
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated.entries()[0].message, "note 3");
    }

    #[test]
    fn entry_serde_uses_camel_case_and_omits_absent_fields() {
        let entry = LogEntry::system(Utc::now(), "started");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["kind"], "system");
        assert_eq!(json["status"], "info");
        assert_eq!(json["bytesEstimated"], 0);
        assert!(json.get("target").is_none());
        assert!(json.get("durationMs").is_none());
        assert!(json.get("interactionSummary").is_none());
    }
}
