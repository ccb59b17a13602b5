//! Single-file JSON store.
//!
//! All sections live in one JSON document. Writes serialize the full
//! document to a sibling temp file and rename it over the original, so a
//! crash mid-write never leaves a torn file behind.

use std::io::ErrorKind;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

use super::{StateKey, StateStore, StoreError};

/// File-backed section storage.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the document.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load_document(&self) -> Result<Map<String, Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(error) => Err(error.into()),
        }
    }
}

impl StateStore for JsonFileStore {
    async fn read(&self, key: StateKey) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        let document = self.load_document().await?;
        Ok(document.get(key.as_str()).cloned())
    }

    async fn write(&self, key: StateKey, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        // A corrupt document would otherwise wedge every future write; start
        // fresh and let reads fall back to defaults for the lost sections.
        let mut document = match self.load_document().await {
            Ok(document) => document,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "state file unreadable, rewriting");
                Map::new()
            }
        };
        document.insert(key.as_str().to_string(), value);

        let bytes = serde_json::to_vec_pretty(&Value::Object(document))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
