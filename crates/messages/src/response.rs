//! Response messages: `{id, response, result, error?, timestamp}` on the wire.

use benchnet_types::Role;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Response tags, one per request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Info,
    Evaluation,
    Snapshot,
    Report,
    Built,
    Vnfbr,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Info => "info",
            ResponseKind::Evaluation => "evaluation",
            ResponseKind::Snapshot => "snapshot",
            ResponseKind::Report => "report",
            ResponseKind::Built => "built",
            ResponseKind::Vnfbr => "vnfbr",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response body, tagged by response kind on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "response", content = "result", rename_all = "lowercase")]
pub enum Response {
    Info(Info),
    Evaluation(Evaluation),
    Snapshot(Snapshot),
    Report(Report),
    Built(Built),
    Vnfbr(Vnfbr),
}

impl Response {
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Info(_) => ResponseKind::Info,
            Response::Evaluation(_) => ResponseKind::Evaluation,
            Response::Snapshot(_) => ResponseKind::Snapshot,
            Response::Report(_) => ResponseKind::Report,
            Response::Built(_) => ResponseKind::Built,
            Response::Vnfbr(_) => ResponseKind::Vnfbr,
        }
    }
}

/// Structured error attached to a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorInfo {
    pub fn from_data(data: impl Into<Value>) -> Self {
        ErrorInfo {
            code: None,
            message: None,
            data: Some(data.into()),
        }
    }
}

/// Identity announcement answering a `hello`.
///
/// `prefix` echoes the (possibly renumbered) routing token the responder
/// holds for the requester's pairing; `features` is the responder's
/// capability profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub uuid: Option<String>,
    pub prefix: Option<String>,
    pub role: Option<Role>,
    pub url: Option<String>,
    #[serde(default)]
    pub features: Value,
}

/// Outcome of one tool invocation.
///
/// Exactly one of `metrics` or `error` is populated: metrics on a clean
/// exit, error (with the tool's output as data) on a non-zero one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub series: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// One trial's evaluations from a single agent or monitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Value>,
    /// Responding component's uuid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Stamped by the manager when merging trial rounds.
    #[serde(default)]
    pub trial: u32,
    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}

/// All trials of one experiment instance, aggregated by the manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub test: u32,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

/// Host entry in a deploy acknowledgment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management: Option<Management>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Management-plane addressing for a deployed host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Management {
    pub ip: String,
}

/// Deploy backend acknowledgment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuiltAck {
    #[serde(default)]
    pub running: bool,
    /// Host id → deployed host info.
    #[serde(default)]
    pub info: Map<String, Value>,
}

/// Answer to a `deploy` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Built {
    #[serde(default)]
    pub ack: BuiltAck,
}

/// Final benchmark result: the executed descriptor plus its post-processed
/// profile, delivered to the layout callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vnfbr {
    #[serde(default)]
    pub vnfbd: Value,
    #[serde(default)]
    pub vnfpp: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_shape() {
        let response = Response::Info(Info {
            uuid: Some("mon-1".into()),
            prefix: Some("4242".into()),
            role: Some(Role::Monitor),
            url: Some("http://10.0.0.3:8987".into()),
            features: serde_json::json!({"listeners": {}}),
        });
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["response"], "info");
        assert_eq!(wire["result"]["prefix"], "4242");
    }

    #[test]
    fn test_evaluation_error_exclusive() {
        let ok = Evaluation {
            id: "1".into(),
            tool: Some("ping".into()),
            metrics: Some(serde_json::json!({"rtt_avg": 0.3})),
            ..Default::default()
        };
        assert!(ok.error.is_none());

        let failed = Evaluation {
            id: "2".into(),
            tool: Some("iperf3".into()),
            error: Some(ErrorInfo::from_data("connection refused")),
            ..Default::default()
        };
        assert!(failed.metrics.is_none());
        let wire = serde_json::to_value(&failed).unwrap();
        assert!(wire.get("metrics").is_none());
        assert_eq!(wire["error"]["data"], "connection refused");
    }

    #[test]
    fn test_unknown_response_tag_rejected() {
        let raw = r#"{"response": "verdict", "result": {}}"#;
        assert!(serde_json::from_str::<Response>(raw).is_err());
    }
}
