//! Chaff - decoy browsing noise generation
//!
//! This library provides the core functionality for generating scheduled
//! decoy browsing actions (searches, page visits, ad clicks) against a
//! pluggable resource host, with bounded telemetry and crash-safe lifecycle
//! reconciliation.
//!
//! # High-Level API
//!
//! The [`engine`] module provides the main entry point:
//!
//! ```ignore
//! use chaff::config::EngineConfig;
//! use chaff::engine::Engine;
//! use chaff::host::HttpResourceHost;
//! use chaff::store::JsonFileStore;
//!
//! let store = JsonFileStore::new("chaff-state.json");
//! let host = HttpResourceHost::new()?;
//! let engine = Engine::load(store, host, EngineConfig::default()).await;
//!
//! // Pick up a persisted running state, then serve protocol requests.
//! engine.reconcile().await;
//! let response = engine.handle_request(request).await;
//! ```

pub mod bandwidth;
pub mod catalog;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod eventlog;
pub mod executor;
pub mod generator;
pub mod host;
pub mod logging;
pub mod protocol;
pub mod random;
pub mod scheduler;
pub mod settings;
pub mod stats;
pub mod store;
pub mod task;
pub mod telemetry;

/// Version of the chaff library and host binary.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_random_module_exists() {
        use crate::random::sample_inter_arrival;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(0);
        assert!(sample_inter_arrival(&mut rng, 1.0) > 0.0);
    }
}
