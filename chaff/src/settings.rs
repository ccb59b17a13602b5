//! User-tunable engine settings and their persisted shapes.
//!
//! Each settings group maps to its own persisted section (`intensity`,
//! `engineSettings`, `taskWeights`, `categorySettings`) and supplies
//! documented defaults whenever the section is absent or unreadable.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{DEFAULT_AD_CLICK_WEIGHT, DEFAULT_BROWSE_WEIGHT, DEFAULT_SEARCH_WEIGHT};
use crate::store::{self, StateKey, StateStore};
use crate::task::TaskKind;

/// Validation failures for user-supplied settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A weight was negative, NaN, or infinite.
    #[error("invalid weight for '{key}': {reason}")]
    InvalidWeight { key: String, reason: String },

    /// The task mix has no positive weight at all.
    #[error("task mix requires at least one positive weight")]
    EmptyTaskMix,
}

/// Named intensity preset selecting the Poisson arrival rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Low,
    #[default]
    Medium,
    High,
    Max,
}

impl IntensityLevel {
    /// Expected task arrivals per tick window.
    ///
    /// With the default 60 s tick period this yields 12/30/60/120 tasks per
    /// hour. The rate is read at batch-build time, so a change takes effect
    /// on the next tick's batch.
    pub fn lambda_per_tick(&self) -> f64 {
        match self {
            IntensityLevel::Low => 0.2,
            IntensityLevel::Medium => 0.5,
            IntensityLevel::High => 1.0,
            IntensityLevel::Max => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityLevel::Low => "low",
            IntensityLevel::Medium => "medium",
            IntensityLevel::High => "high",
            IntensityLevel::Max => "max",
        }
    }
}

impl fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntensityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(IntensityLevel::Low),
            "medium" => Ok(IntensityLevel::Medium),
            "high" => Ok(IntensityLevel::High),
            "max" => Ok(IntensityLevel::Max),
            other => Err(format!("unknown intensity level '{other}'")),
        }
    }
}

/// Per-engine user override: whether the engine participates and with what
/// weight. An engine absent from the map uses the catalog default, enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineWeight {
    pub enabled: bool,
    pub weight: f64,
}

/// Relative weights of the three task kinds. Weights need not sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMixWeights {
    #[serde(default = "default_search_weight")]
    pub search: f64,
    #[serde(default = "default_browse_weight")]
    pub browse: f64,
    #[serde(default = "default_ad_click_weight")]
    pub ad_click: f64,
}

fn default_search_weight() -> f64 {
    DEFAULT_SEARCH_WEIGHT
}

fn default_browse_weight() -> f64 {
    DEFAULT_BROWSE_WEIGHT
}

fn default_ad_click_weight() -> f64 {
    DEFAULT_AD_CLICK_WEIGHT
}

impl Default for TaskMixWeights {
    fn default() -> Self {
        Self {
            search: DEFAULT_SEARCH_WEIGHT,
            browse: DEFAULT_BROWSE_WEIGHT,
            ad_click: DEFAULT_AD_CLICK_WEIGHT,
        }
    }
}

impl TaskMixWeights {
    pub fn weight_for(&self, kind: TaskKind) -> f64 {
        match kind {
            TaskKind::Search => self.search,
            TaskKind::Browse => self.browse,
            TaskKind::AdClick => self.ad_click,
        }
    }

    /// Rejects negative or non-finite weights and an all-zero mix.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (key, value) in [
            ("search", self.search),
            ("browse", self.browse),
            ("adClick", self.ad_click),
        ] {
            validate_weight(key, value)?;
        }
        if self.search <= 0.0 && self.browse <= 0.0 && self.ad_click <= 0.0 {
            return Err(SettingsError::EmptyTaskMix);
        }
        Ok(())
    }
}

/// Category id → enabled. An id absent from the map counts as enabled.
pub type CategorySettings = BTreeMap<String, bool>;

/// Engine id → user override.
pub type EngineSettingsMap = BTreeMap<String, EngineWeight>;

fn validate_weight(key: &str, value: f64) -> Result<(), SettingsError> {
    if !value.is_finite() {
        return Err(SettingsError::InvalidWeight {
            key: key.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    if value < 0.0 {
        return Err(SettingsError::InvalidWeight {
            key: key.to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    Ok(())
}

/// Rejects engine override maps carrying negative or non-finite weights.
pub fn validate_engine_weights(engines: &EngineSettingsMap) -> Result<(), SettingsError> {
    for (id, weight) in engines {
        validate_weight(id, weight.weight)?;
    }
    Ok(())
}

/// The complete tunable state read by the task generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub intensity: IntensityLevel,
    pub engines: EngineSettingsMap,
    pub task_weights: TaskMixWeights,
    pub categories: CategorySettings,
}

impl EngineSettings {
    /// Loads every settings section from the store, falling back to the
    /// documented default for any section that is missing or unreadable.
    pub async fn load<S: StateStore>(store: &S) -> Self {
        Self {
            intensity: store::read_or_default(store, StateKey::Intensity).await,
            engines: store::read_or_default(store, StateKey::EngineSettings).await,
            task_weights: store::read_or_default(store, StateKey::TaskWeights).await,
            categories: store::read_or_default(store, StateKey::CategorySettings).await,
        }
    }

    /// True when `category` participates in browse candidate filtering.
    pub fn category_enabled(&self, category: &str) -> bool {
        self.categories.get(category).copied().unwrap_or(true)
    }
}
