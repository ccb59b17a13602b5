//! Persisted engine state: the section keys, the storage seam, and the
//! read-with-fallback policy.
//!
//! The engine must survive the host discarding all in-memory state between
//! any two calls, so every durable fact lives in a [`StateStore`] section.
//! Reads that fail for any reason fall back to documented defaults instead
//! of failing the caller; only writes surface errors.

mod json;
mod memory;

use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The persisted state sections.
///
/// Section names are part of the on-disk format and mirror the protocol's
/// camelCase spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Running,
    Intensity,
    EngineSettings,
    TaskWeights,
    CategorySettings,
    Stats,
    Logs,
    BandwidthHourly,
    BandwidthDaily,
    SessionStart,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::Running => "running",
            StateKey::Intensity => "intensity",
            StateKey::EngineSettings => "engineSettings",
            StateKey::TaskWeights => "taskWeights",
            StateKey::CategorySettings => "categorySettings",
            StateKey::Stats => "stats",
            StateKey::Logs => "logs",
            StateKey::BandwidthHourly => "bandwidthHourly",
            StateKey::BandwidthDaily => "bandwidthDaily",
            StateKey::SessionStart => "sessionStart",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyed JSON section storage.
///
/// Implementations must tolerate concurrent calls; each section has a single
/// logical writer (the engine for settings/state, the telemetry daemon for
/// logs/stats/bandwidth).
pub trait StateStore: Send + Sync + 'static {
    /// Reads a section, `None` when it has never been written.
    fn read(
        &self,
        key: StateKey,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Writes a section wholesale.
    fn write(
        &self,
        key: StateKey,
        value: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Reads and deserializes a section, returning `None` when the section is
/// absent, unreadable, or fails to parse. Failures are logged and swallowed.
pub async fn read_value<T, S>(store: &S, key: StateKey) -> Option<T>
where
    T: DeserializeOwned,
    S: StateStore,
{
    match store.read(key).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                warn!(key = %key, %error, "persisted section failed to parse, using default");
                None
            }
        },
        Ok(None) => None,
        Err(error) => {
            warn!(key = %key, %error, "persisted section unreadable, using default");
            None
        }
    }
}

/// [`read_value`] with a `Default` fallback.
pub async fn read_or_default<T, S>(store: &S, key: StateKey) -> T
where
    T: DeserializeOwned + Default,
    S: StateStore,
{
    read_value(store, key).await.unwrap_or_default()
}

/// Serializes and writes a section.
pub async fn write_value<T, S>(store: &S, key: StateKey, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
    S: StateStore,
{
    let value = serde_json::to_value(value)?;
    store.write(key, value).await
}
