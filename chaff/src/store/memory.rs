//! In-memory store for tests and ephemeral runs.

use dashmap::DashMap;
use serde_json::Value;

use super::{StateKey, StateStore, StoreError};

/// Section storage backed by a concurrent map. Contents vanish with the
/// process, so a reconcile after restart sees an empty store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sections: DashMap<StateKey, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    async fn read(&self, key: StateKey) -> Result<Option<Value>, StoreError> {
        Ok(self.sections.get(&key).map(|entry| entry.value().clone()))
    }

    async fn write(&self, key: StateKey, value: Value) -> Result<(), StoreError> {
        self.sections.insert(key, value);
        Ok(())
    }
}
