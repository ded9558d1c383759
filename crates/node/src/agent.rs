//! The agent role: runs probers against a target on instruction.

use crate::component::{Base, InfoOutcome};
use crate::executor::{Actuator, ToolEntry};
use benchnet_core::{Action, Event, EventHandler, EventKind, HandlerError};
use benchnet_messages::{
    Envelope, Instruction, Method, Payload, Request, Response, ResponseKind, Snapshot,
};
use benchnet_types::{Identity, Peers, Role};
use serde_json::{json, Value};
use tracing::{info, warn};

pub struct Agent {
    base: Base,
    actuator: Actuator,
}

impl Agent {
    pub fn new(identity: Identity, probers: Vec<ToolEntry>) -> Self {
        Agent {
            base: Base::new(identity),
            actuator: Actuator::probe("prober", probers),
        }
    }

    pub fn peers(&self) -> &Peers {
        &self.base.peers
    }

    fn features(&self) -> Value {
        json!({"probers": self.actuator.advertised()})
    }

    /// Run the instruction's actions and answer with one snapshot carrying
    /// every evaluation, failed ones included.
    fn instruction(&mut self, envelope: &Envelope, instruction: &Instruction) -> Vec<Action> {
        let evaluations = self.actuator.act(instruction);
        info!(
            id = %envelope.id,
            evaluations = evaluations.len(),
            "instruction evaluated"
        );
        let snapshot = Snapshot {
            component: self.base.identity.uuid.clone(),
            role: Some(Role::Agent),
            evaluations,
            ..Default::default()
        };
        match self.base.reply_to(envelope, Response::Snapshot(snapshot)) {
            Some(reply) => vec![Action::Deliver(reply)],
            None => {
                warn!(id = %envelope.id, "instruction from an unknown peer, snapshot dropped");
                vec![]
            }
        }
    }
}

impl EventHandler for Agent {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::Request(Method::Hello),
            EventKind::Request(Method::Instruction),
            EventKind::Reply(ResponseKind::Info),
            EventKind::Greetings,
        ]
    }

    fn handle(&mut self, event: Event) -> Result<Vec<Action>, HandlerError> {
        match event {
            Event::Message(envelope) => match envelope.payload.clone() {
                Payload::Request(Request::Hello(hello)) => {
                    Ok(self.base.handle_hello(&envelope, &hello, self.features()))
                }
                Payload::Request(Request::Instruction(instruction)) => {
                    Ok(self.instruction(&envelope, &instruction))
                }
                Payload::Response(Response::Info(info)) => {
                    match self.base.handle_info(&envelope, &info) {
                        InfoOutcome::AnswerHello { hello, .. } => {
                            Ok(match self.base.reply_info(&hello, self.features()) {
                                Some(reply) => vec![Action::Deliver(reply)],
                                None => vec![],
                            })
                        }
                        _ => Ok(vec![]),
                    }
                }
                _ => Err(HandlerError::recoverable("unexpected message for agent")),
            },
            Event::Greetings { contacts, hello } => Ok(self.base.greetings(&contacts, hello)),
            other => Err(HandlerError::recoverable(format!(
                "unexpected event {} for agent",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchnet_messages::{ActionSpec, OnError, Stimulus};
    use serde_json::Map;

    #[test]
    fn test_unknown_tool_yields_error_evaluation() {
        let mut agent = Agent::new(
            Identity::local("http://10.0.0.2:8988", "agent-1", Role::Agent),
            vec![],
        );
        // Register the requester so the snapshot can be stamped back.
        agent.base.peers.hello_received(
            "http://10.0.0.1:8989",
            Some("mgr-1".into()),
            Some("300".into()),
            Some(Role::Manager),
        );

        let mut instruction = Instruction::default();
        instruction.add_action(ActionSpec {
            id: "1".into(),
            stimulus: Stimulus {
                id: "77".into(),
                name: None,
                parameters: Map::new(),
            },
            on_error: OnError::default(),
        });
        let mut envelope = Envelope::request(Request::Instruction(instruction));
        envelope.received_via("10.0.0.1", "300");

        let actions = agent.handle(Event::Message(envelope)).unwrap();
        let Action::Deliver(reply) = &actions[0] else {
            panic!("expected a delivered snapshot");
        };
        let Payload::Response(Response::Snapshot(snapshot)) = &reply.payload else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.component.as_deref(), Some("agent-1"));
        assert_eq!(snapshot.evaluations.len(), 1);
        assert!(snapshot.evaluations[0].error.is_some());
    }

    #[test]
    fn test_features_advertise_probers() {
        let agent = Agent::new(
            Identity::local("http://10.0.0.2:8988", "agent-1", Role::Agent),
            vec![],
        );
        assert_eq!(agent.features(), json!({"probers": {}}));
    }
}
