//! Request messages: `{id, method, params}` on the wire.

use benchnet_types::{Contact, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::ResponseKind;

/// Request method tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Hello,
    Action,
    Instruction,
    Task,
    Layout,
    Deploy,
}

impl Method {
    /// The response tag answering this method. Fixed table; used to validate
    /// incoming reply payloads against the request that produced them.
    pub fn response_kind(&self) -> ResponseKind {
        match self {
            Method::Hello => ResponseKind::Info,
            Method::Action => ResponseKind::Evaluation,
            Method::Instruction => ResponseKind::Snapshot,
            Method::Task => ResponseKind::Report,
            Method::Layout => ResponseKind::Vnfbr,
            Method::Deploy => ResponseKind::Built,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Hello => "hello",
            Method::Action => "action",
            Method::Instruction => "instruction",
            Method::Task => "task",
            Method::Layout => "layout",
            Method::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request body, tagged by method on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "lowercase")]
pub enum Request {
    Hello(Hello),
    Action(ActionSpec),
    Instruction(Instruction),
    Task(Task),
    Layout(Layout),
    Deploy(Deploy),
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Request::Hello(_) => Method::Hello,
            Request::Action(_) => Method::Action,
            Request::Instruction(_) => Method::Instruction,
            Request::Task(_) => Method::Task,
            Request::Layout(_) => Method::Layout,
            Request::Deploy(_) => Method::Deploy,
        }
    }
}

/// Greeting payload announcing the sender's identity.
///
/// `prefix` is the routing token the sender assigned to this pairing; the
/// receiver adopts it (renumbering on local collision). `contacts` carries
/// transitive introductions to be greeted by the receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    pub uuid: Option<String>,
    pub prefix: Option<String>,
    pub role: Option<Role>,
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,
}

/// One tool invocation: which tool and with which arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    /// Tool id (prober or listener).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Failure policy for one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnError {
    pub abort: bool,
    pub retry: u32,
}

impl Default for OnError {
    fn default() -> Self {
        OnError {
            abort: true,
            retry: 0,
        }
    }
}

/// A single action to execute: one stimulus plus its failure policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub id: String,
    pub stimulus: Stimulus,
    #[serde(default)]
    pub on_error: OnError,
}

/// A batch of actions an agent or monitor must run for one trial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instruction {
    /// Actions keyed by action id; iteration order is stable.
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSpec>,
}

impl Instruction {
    /// Add an action, ignoring duplicates of the same id.
    pub fn add_action(&mut self, action: ActionSpec) {
        self.actions.entry(action.id.clone()).or_insert(action);
    }
}

/// A tool selected by capability matching, with the resolved parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSelection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// A task assigning matched tools to agents and monitors for `trials`
/// repeated rounds of one experiment instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    /// Agent component id → probers to run there.
    #[serde(default)]
    pub agents: BTreeMap<String, Vec<ToolSelection>>,
    /// Monitor component id → listeners to run there.
    #[serde(default)]
    pub monitors: BTreeMap<String, Vec<ToolSelection>>,
    #[serde(default)]
    pub trials: u32,
    #[serde(default)]
    pub test: u32,
}

/// Reference to a benchmark descriptor plus the caller's input overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRef {
    pub id: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// Kick off an experiment: which descriptor to run and where to deliver the
/// final VNF-BR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub vnf_bd: LayoutRef,
    pub callback: Option<String>,
}

/// Start/stop request for the topology deploy collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployRequest {
    Start,
    Stop,
}

/// Hand a scenario to the deploy backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deploy {
    pub scenario: Value,
    pub callback: Option<String>,
    pub request: DeployRequest,
    pub instance: Option<u64>,
    #[serde(default)]
    pub continuous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_response_table() {
        assert_eq!(Method::Hello.response_kind(), ResponseKind::Info);
        assert_eq!(Method::Action.response_kind(), ResponseKind::Evaluation);
        assert_eq!(Method::Instruction.response_kind(), ResponseKind::Snapshot);
        assert_eq!(Method::Task.response_kind(), ResponseKind::Report);
        assert_eq!(Method::Deploy.response_kind(), ResponseKind::Built);
        assert_eq!(Method::Layout.response_kind(), ResponseKind::Vnfbr);
    }

    #[test]
    fn test_request_wire_shape() {
        let request = Request::Hello(Hello {
            uuid: Some("agent-1".into()),
            prefix: Some("777".into()),
            role: Some(Role::Agent),
            url: Some("http://10.0.0.1:8988".into()),
            contacts: vec![],
        });
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["method"], "hello");
        assert_eq!(wire["params"]["uuid"], "agent-1");
        assert!(wire["params"].get("contacts").is_none());
    }

    #[test]
    fn test_instruction_dedups_action_ids() {
        let mut instruction = Instruction::default();
        let action = ActionSpec {
            id: "12".into(),
            stimulus: Stimulus {
                id: "ping".into(),
                name: None,
                parameters: Map::new(),
            },
            on_error: OnError::default(),
        };
        instruction.add_action(action.clone());
        instruction.add_action(action);
        assert_eq!(instruction.actions.len(), 1);
    }
}
