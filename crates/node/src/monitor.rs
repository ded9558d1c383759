//! The monitor role: watches a target with listeners on instruction.
//!
//! Structurally the mirror of the agent; the differences are which tool set
//! it runs (listeners) and the role it stamps on its snapshots.

use crate::component::{Base, InfoOutcome};
use crate::executor::{Actuator, ToolEntry};
use benchnet_core::{Action, Event, EventHandler, EventKind, HandlerError};
use benchnet_messages::{
    Envelope, Instruction, Method, Payload, Request, Response, ResponseKind, Snapshot,
};
use benchnet_types::{Identity, Peers, Role};
use serde_json::{json, Value};
use tracing::{info, warn};

pub struct Monitor {
    base: Base,
    actuator: Actuator,
}

impl Monitor {
    pub fn new(identity: Identity, listeners: Vec<ToolEntry>) -> Self {
        Monitor {
            base: Base::new(identity),
            actuator: Actuator::probe("listener", listeners),
        }
    }

    pub fn peers(&self) -> &Peers {
        &self.base.peers
    }

    fn features(&self) -> Value {
        json!({"listeners": self.actuator.advertised()})
    }

    fn instruction(&mut self, envelope: &Envelope, instruction: &Instruction) -> Vec<Action> {
        let evaluations = self.actuator.act(instruction);
        info!(
            id = %envelope.id,
            evaluations = evaluations.len(),
            "instruction evaluated"
        );
        let snapshot = Snapshot {
            component: self.base.identity.uuid.clone(),
            role: Some(Role::Monitor),
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

impl EventHandler for Monitor {
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
                _ => Err(HandlerError::recoverable("unexpected message for monitor")),
            },
            Event::Greetings { contacts, hello } => Ok(self.base.greetings(&contacts, hello)),
            other => Err(HandlerError::recoverable(format!(
                "unexpected event {} for monitor",
                other.kind()
            ))),
        }
    }
}
