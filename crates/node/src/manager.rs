//! The manager role: turns a task into per-component instructions and
//! aggregates the snapshots of every trial into one report.
//!
//! A task names which agents and monitors run which tools, and how many
//! trial rounds to repeat. Each round is one instruction fan-out tracked by
//! the correlator; when the round's snapshots are all in, the round is
//! recorded in the task's ledger entry and either the next round starts or
//! the report goes back to the player.

use crate::component::{Base, InfoOutcome};
use benchnet_core::{Action, Event, EventHandler, EventKind, HandlerError};
use benchnet_messages::{
    next_message_id, ActionSpec, Envelope, Instruction, Method, OnError, Payload, Report, Request,
    Response, ResponseKind, Snapshot, Stimulus, Task, ToolSelection,
};
use benchnet_types::{Identity, PeerField, Peers, Role};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

struct TaskRecord {
    origin: Envelope,
    task: Task,
    acks: u32,
    pack: Vec<Vec<Snapshot>>,
}

pub struct Manager {
    base: Base,
    ledger: HashMap<String, TaskRecord>,
}

impl Manager {
    pub fn new(identity: Identity) -> Self {
        Manager {
            base: Base::new(identity),
            ledger: HashMap::new(),
        }
    }

    pub fn peers(&self) -> &Peers {
        &self.base.peers
    }

    /// Advertised structure: every established agent and monitor, with the
    /// tool sets they announced in their infos.
    fn features(&self) -> Value {
        let by_role = |role: Role| -> Vec<Value> {
            self.base
                .peers
                .by_role(role)
                .into_iter()
                .filter(|peer| peer.ack)
                .filter_map(|peer| serde_json::to_value(peer).ok())
                .collect()
        };
        json!({
            "agents": by_role(Role::Agent),
            "monitors": by_role(Role::Monitor),
        })
    }

    fn task(&mut self, envelope: &Envelope, task: &Task) -> Vec<Action> {
        if !self.ledger.contains_key(&envelope.id) {
            self.ledger.insert(
                envelope.id.clone(),
                TaskRecord {
                    origin: envelope.clone(),
                    task: task.clone(),
                    acks: 0,
                    pack: Vec::new(),
                },
            );
        }
        info!(id = %envelope.id, trials = task.trials, "task accepted");
        self.task_round(envelope, task)
    }

    /// Fan one trial round out as instructions, tracked against the task.
    fn task_round(&mut self, origin: &Envelope, task: &Task) -> Vec<Action> {
        let mut outputs = Vec::new();
        for (component, tools) in &task.agents {
            match self.build_instruction(component, tools) {
                Some(envelope) => outputs.push(envelope),
                None => warn!(component, "no established agent for task component"),
            }
        }
        for (component, tools) in &task.monitors {
            match self.build_instruction(component, tools) {
                Some(envelope) => outputs.push(envelope),
                None => warn!(component, "no established monitor for task component"),
            }
        }
        if outputs.is_empty() {
            warn!(id = %origin.id, "task produced no instructions, dropped");
            self.ledger.remove(&origin.id);
            return vec![];
        }
        self.base.correlator.track(origin, &outputs);
        outputs.into_iter().map(Action::Deliver).collect()
    }

    fn build_instruction(&self, component: &str, tools: &[ToolSelection]) -> Option<Envelope> {
        let peer = self.base.peers.find(PeerField::Uuid, component)?;
        let mut instruction = Instruction::default();
        for tool in tools {
            instruction.add_action(ActionSpec {
                id: next_message_id(),
                stimulus: Stimulus {
                    id: tool.id.clone(),
                    name: tool.name.clone(),
                    parameters: tool.parameters.clone(),
                },
                on_error: OnError::default(),
            });
        }
        let mut envelope = Envelope::request(Request::Instruction(instruction));
        envelope.to(peer.address.clone(), Some(peer.prefix.clone()));
        Some(envelope)
    }

    fn snapshot(&mut self, envelope: &Envelope) -> Vec<Action> {
        if !self.base.correlator.ack(envelope) {
            warn!(id = %envelope.id, "snapshot does not answer any pending round, dropped");
            return vec![];
        }
        if !self.base.correlator.all_acked(envelope) {
            return vec![];
        }
        let Some(key) = self.base.correlator.input_key_for(envelope) else {
            return vec![];
        };
        let Some((origin, replies)) = self.base.correlator.drain(&key) else {
            return vec![];
        };
        let snapshots: Vec<Snapshot> = replies
            .iter()
            .filter_map(|reply| match &reply.payload {
                Payload::Response(Response::Snapshot(snapshot)) => Some(snapshot.clone()),
                _ => None,
            })
            .collect();
        self.round_complete(&origin, snapshots)
    }

    fn round_complete(&mut self, origin: &Envelope, snapshots: Vec<Snapshot>) -> Vec<Action> {
        let Some(record) = self.ledger.get_mut(&origin.id) else {
            warn!(id = %origin.id, "round for an unknown task, dropped");
            return vec![];
        };
        record.acks += 1;
        record.pack.push(snapshots);
        info!(
            id = %origin.id,
            round = record.acks,
            trials = record.task.trials,
            "trial round complete"
        );
        if record.acks < record.task.trials {
            let task = record.task.clone();
            let origin = record.origin.clone();
            return self.task_round(&origin, &task);
        }
        let Some(record) = self.ledger.remove(&origin.id) else {
            return vec![];
        };
        self.checkout(record)
    }

    /// Merge every round into the final report, stamping each snapshot with
    /// the trial it came from.
    fn checkout(&mut self, record: TaskRecord) -> Vec<Action> {
        let mut snapshots = Vec::new();
        for (trial, round) in record.pack.into_iter().enumerate() {
            for mut snapshot in round {
                snapshot.trial = trial as u32;
                snapshots.push(snapshot);
            }
        }
        let report = Report {
            component: self.base.identity.uuid.clone(),
            role: Some(Role::Manager),
            test: record.task.test,
            snapshots,
            ..Default::default()
        };
        info!(id = %record.origin.id, "task checked out, reporting");
        match self.base.reply_to(&record.origin, Response::Report(report)) {
            Some(reply) => vec![Action::Deliver(reply)],
            None => {
                warn!(id = %record.origin.id, "task requester unknown, report dropped");
                vec![]
            }
        }
    }
}

impl EventHandler for Manager {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::Request(Method::Hello),
            EventKind::Request(Method::Task),
            EventKind::Reply(ResponseKind::Info),
            EventKind::Reply(ResponseKind::Snapshot),
            EventKind::Greetings,
        ]
    }

    fn handle(&mut self, event: Event) -> Result<Vec<Action>, HandlerError> {
        match event {
            Event::Message(envelope) => match envelope.payload.clone() {
                Payload::Request(Request::Hello(hello)) => {
                    Ok(self.base.handle_hello(&envelope, &hello, self.features()))
                }
                Payload::Request(Request::Task(task)) => Ok(self.task(&envelope, &task)),
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
                Payload::Response(Response::Snapshot(_)) => Ok(self.snapshot(&envelope)),
                _ => Err(HandlerError::recoverable("unexpected message for manager")),
            },
            Event::Greetings { contacts, hello } => Ok(self.base.greetings(&contacts, hello)),
            other => Err(HandlerError::recoverable(format!(
                "unexpected event {} for manager",
                other.kind()
            ))),
        }
    }
}
