//! Control protocol between the engine and UI clients.
//!
//! Requests are action-keyed JSON objects (`{"action": "set-intensity",
//! "level": "high"}`); every response is either an `{ok: true, ...}` payload
//! or `{error: string}`. The shapes here are the wire contract, so field
//! names are pinned by serde attributes rather than struct naming.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eventlog::LogEntry;
use crate::settings::{CategorySettings, EngineSettingsMap, IntensityLevel, TaskMixWeights};
use crate::stats::KindCounters;

/// A client request, dispatched by its `action` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Request {
    Start,
    Stop,
    SetIntensity { level: IntensityLevel },
    SetEngines { engines: EngineSettingsMap },
    SetTaskWeights { weights: TaskMixWeights },
    SetCategories { categories: CategorySettings },
    GetStatus,
    GetLogs,
    GetBandwidth,
    GetSettings,
    ClearLogs,
}

/// Engine status payload for `get-status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub running: bool,
    pub intensity: IntensityLevel,
    pub stats: StatsReport,
    pub session_bandwidth: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_start: Option<DateTime<Utc>>,
}

/// Counter block inside [`StatusReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub totals: KindCounters,
    pub today: KindCounters,
    pub days_active: usize,
}

/// Bandwidth payload for `get-bandwidth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthReport {
    pub hourly: BTreeMap<String, u64>,
    pub daily: BTreeMap<String, u64>,
    pub session: u64,
}

/// Effective settings payload for `get-settings`: catalog defaults overlaid
/// with the user's overrides, never the raw override map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsReport {
    pub engines: EngineSettingsMap,
    pub task_weights: TaskMixWeights,
    pub categories: CategorySettings,
}

/// A response to one request.
///
/// Untagged: the error variant must stay first so deserialization never
/// mistakes `{error}` for a payload, and the bare ack last so it cannot
/// swallow payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Error {
        error: String,
    },
    Status {
        ok: bool,
        #[serde(flatten)]
        report: StatusReport,
    },
    Logs {
        ok: bool,
        entries: Vec<LogEntry>,
    },
    Bandwidth {
        ok: bool,
        #[serde(flatten)]
        report: BandwidthReport,
    },
    Settings {
        ok: bool,
        #[serde(flatten)]
        report: SettingsReport,
    },
    Ack {
        ok: bool,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack { ok: true }
    }

    pub fn error(message: impl ToString) -> Self {
        Response::Error {
            error: message.to_string(),
        }
    }

    pub fn status(report: StatusReport) -> Self {
        Response::Status { ok: true, report }
    }

    pub fn logs(entries: Vec<LogEntry>) -> Self {
        Response::Logs { ok: true, entries }
    }

    pub fn bandwidth(report: BandwidthReport) -> Self {
        Response::Bandwidth { ok: true, report }
    }

    pub fn settings(report: SettingsReport) -> Self {
        Response::Settings { ok: true, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EngineWeight;

    #[test]
    fn requests_parse_from_their_wire_forms() {
        let start: Request = serde_json::from_str(r#"{"action":"start"}"#).unwrap();
        assert!(matches!(start, Request::Start));

        let intensity: Request =
            serde_json::from_str(r#"{"action":"set-intensity","level":"high"}"#).unwrap();
        assert!(matches!(
            intensity,
            Request::SetIntensity {
                level: IntensityLevel::High
            }
        ));

        let engines: Request = serde_json::from_str(
            r#"{"action":"set-engines","engines":{"google":{"enabled":false,"weight":40.0}}}"#,
        )
        .unwrap();
        match engines {
            Request::SetEngines { engines } => {
                assert_eq!(
                    engines.get("google"),
                    Some(&EngineWeight {
                        enabled: false,
                        weight: 40.0
                    })
                );
            }
            other => panic!("parsed {other:?}"),
        }

        let weights: Request = serde_json::from_str(
            r#"{"action":"set-task-weights","weights":{"search":60,"browse":30,"adClick":10}}"#,
        )
        .unwrap();
        match weights {
            Request::SetTaskWeights { weights } => assert_eq!(weights.search, 60.0),
            other => panic!("parsed {other:?}"),
        }

        let clear: Request = serde_json::from_str(r#"{"action":"clear-logs"}"#).unwrap();
        assert!(matches!(clear, Request::ClearLogs));
    }

    #[test]
    fn unknown_actions_fail_to_parse() {
        assert!(serde_json::from_str::<Request>(r#"{"action":"reboot"}"#).is_err());
        assert!(serde_json::from_str::<Request>(r#"{"level":"high"}"#).is_err());
    }

    #[test]
    fn ack_and_error_shapes() {
        assert_eq!(
            serde_json::to_string(&Response::ok()).unwrap(),
            r#"{"ok":true}"#
        );
        assert_eq!(
            serde_json::to_string(&Response::error("task mix requires at least one positive weight"))
                .unwrap(),
            r#"{"error":"task mix requires at least one positive weight"}"#
        );
    }

    #[test]
    fn status_response_flattens_the_report() {
        let response = Response::status(StatusReport {
            running: true,
            intensity: IntensityLevel::Medium,
            stats: StatsReport {
                totals: KindCounters::default(),
                today: KindCounters::default(),
                days_active: 3,
            },
            session_bandwidth: 1_234,
            session_start: None,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["running"], true);
        assert_eq!(json["intensity"], "medium");
        assert_eq!(json["stats"]["daysActive"], 3);
        assert_eq!(json["sessionBandwidth"], 1_234);
        assert!(json.get("sessionStart").is_none());
    }

    #[test]
    fn payload_responses_round_trip() {
        let bandwidth = Response::bandwidth(BandwidthReport {
            hourly: BTreeMap::from([("2026-04-01T10".to_string(), 5_000u64)]),
            daily: BTreeMap::from([("2026-04-01".to_string(), 5_000u64)]),
            session: 5_000,
        });
        let json = serde_json::to_string(&bandwidth).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        match parsed {
            Response::Bandwidth { ok, report } => {
                assert!(ok);
                assert_eq!(report.session, 5_000);
                assert_eq!(report.hourly.get("2026-04-01T10"), Some(&5_000));
            }
            other => panic!("parsed {other:?}"),
        }

        let logs = Response::logs(Vec::new());
        let json = serde_json::to_string(&logs).unwrap();
        assert_eq!(json, r#"{"ok":true,"entries":[]}"#);
    }
}
