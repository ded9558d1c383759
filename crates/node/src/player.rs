//! The player role: runs a whole benchmark from a layout request to the
//! delivered VNF-BR.
//!
//! One experiment at a time: a layout picks a descriptor out of the
//! catalog, the descriptor is multiplexed into instances, and each instance
//! in turn is (optionally) deployed, matched against a manager and tasked.
//! Every instance's report feeds the VNF-PP; when the cursor runs out the
//! profile is compiled and the VNF-BR delivered to the layout's callback.

use crate::component::{Base, InfoOutcome};
use benchnet_core::{Action, Event, EventHandler, EventKind, HandlerError};
use benchnet_messages::{
    Built, Deploy, DeployRequest, Envelope, HostInfo, Layout, Method, Payload, Report, Request,
    Response, ResponseKind, Task, Vnfbr,
};
use benchnet_types::{Contact, Identity, Peers, Role};
use benchnet_vnfbd::{VnfBd, VnfPp};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Management-plane ports per role, used to derive contact urls from the
/// hosts a deploy reports back.
const MONITOR_PORT: u16 = 8987;
const AGENT_PORT: u16 = 8988;
const MANAGER_PORT: u16 = 8989;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Available,
    Busy,
}

pub struct Player {
    base: Base,
    catalog: HashMap<String, PathBuf>,
    status: Status,
    layout: Option<Envelope>,
    vnfbd: Option<VnfBd>,
    instance: Option<VnfBd>,
    vnfpp: Option<VnfPp>,
}

impl Player {
    pub fn new(identity: Identity, catalog: HashMap<String, PathBuf>) -> Self {
        Player {
            base: Base::new(identity),
            catalog,
            status: Status::Available,
            layout: None,
            vnfbd: None,
            instance: None,
            vnfpp: None,
        }
    }

    pub fn peers(&self) -> &Peers {
        &self.base.peers
    }

    pub fn is_available(&self) -> bool {
        self.status == Status::Available
    }

    fn features(&self) -> Value {
        let managers: Vec<Value> = self
            .base
            .peers
            .by_role(Role::Manager)
            .into_iter()
            .filter_map(|peer| serde_json::to_value(peer).ok())
            .collect();
        json!({"managers": managers})
    }

    /// Accept a layout: load the descriptor it names, expand the input
    /// sweep and start the instance cycle.
    fn layout(&mut self, envelope: &Envelope, layout: &Layout) -> Result<Vec<Action>, HandlerError> {
        if self.status == Status::Busy {
            return Err(HandlerError::recoverable(
                "already running an experiment, layout dropped",
            ));
        }
        let path = self.catalog.get(&layout.vnf_bd.id).ok_or_else(|| {
            HandlerError::recoverable(format!(
                "descriptor {} is not in the catalog",
                layout.vnf_bd.id
            ))
        })?;
        let mut vnfbd = VnfBd::load(path, layout.vnf_bd.inputs.clone())
            .map_err(|err| HandlerError::recoverable(format!("descriptor rejected: {err}")))?;
        vnfbd.multiplex_parameters();
        let mut vnfpp = VnfPp::new(layout.vnf_bd.id.clone());
        vnfpp.parse_inputs(vnfbd.inputs());

        info!(descriptor = %layout.vnf_bd.id, id = %envelope.id, "layout accepted");
        self.layout = Some(envelope.clone());
        self.vnfbd = Some(vnfbd);
        self.vnfpp = Some(vnfpp);
        self.status = Status::Busy;
        self.check()
    }

    /// Advance the experiment: instantiate the next input, or compile and
    /// finish when the cursor is exhausted.
    fn check(&mut self) -> Result<Vec<Action>, HandlerError> {
        let vnfbd = self
            .vnfbd
            .as_mut()
            .ok_or_else(|| HandlerError::recoverable("no descriptor loaded"))?;
        match vnfbd.next_input() {
            Some(input) => self.instantiate(input),
            None => self.finish(),
        }
    }

    /// Build the instance for one input set: re-render the template against
    /// it and either deploy its scenario first or go straight to tasking.
    fn instantiate(&mut self, input: Map<String, Value>) -> Result<Vec<Action>, HandlerError> {
        let parent = self
            .vnfbd
            .as_ref()
            .ok_or_else(|| HandlerError::recoverable("no descriptor loaded"))?;
        let instance_id = input.get("id").and_then(Value::as_u64).unwrap_or_default();
        let test_id = input.get("test").and_then(Value::as_u64).unwrap_or_default();

        let mut instance = match parent.template_path() {
            Some(path) => VnfBd::load(path, input.clone()),
            None => {
                let data = match parent.to_value() {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                VnfBd::from_value(data, input.clone())
            }
        }
        .map_err(|err| HandlerError::recoverable(format!("instance rejected: {err}")))?;
        instance.set_instance_id(instance_id);
        instance.set_test_id(test_id);
        info!(instance = instance_id, test = test_id, "instance ready");

        let needs_deploy = instance.needs_deploy();
        self.instance = Some(instance);
        if needs_deploy {
            self.deploy(DeployRequest::Start)
        } else {
            Ok(vec![Action::Raise(Event::Tasks {
                vnfbd: Value::Object(input),
            })])
        }
    }

    /// Find a manager whose advertised structure satisfies the instance and
    /// hand it the task. The task's id is the instance id, so the report
    /// coming back maps onto the instance without extra bookkeeping.
    fn task(&mut self) -> Result<Vec<Action>, HandlerError> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| HandlerError::recoverable("no instance to schedule"))?;
        for manager in self.base.peers.by_role(Role::Manager) {
            let available = assistant_structure(&manager.features);
            let Some(mapping) = instance.satisfy(&available) else {
                debug!(
                    manager = manager.uuid.as_deref().unwrap_or("?"),
                    "manager structure does not satisfy the instance"
                );
                continue;
            };
            let task = Task {
                agents: mapping.agents,
                monitors: mapping.monitors,
                trials: instance.trials() as u32,
                test: instance.test_id() as u32,
            };
            let id = instance.instance_id().unwrap_or_default().to_string();
            let mut envelope = Envelope::request_with_id(id, Request::Task(task));
            envelope.to(manager.address.clone(), Some(manager.prefix.clone()));
            info!(
                manager = manager.uuid.as_deref().unwrap_or("?"),
                id = %envelope.id,
                "task scheduled"
            );
            return Ok(vec![Action::Deliver(envelope)]);
        }
        Err(HandlerError::recoverable(
            "no manager satisfies the instance requirements",
        ))
    }

    /// Absorb a report and move on to the next instance.
    fn digest(&mut self, envelope: &Envelope, report: &Report) -> Result<Vec<Action>, HandlerError> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| HandlerError::recoverable("report without a running instance"))?;
        let expected = instance.instance_id().unwrap_or_default().to_string();
        if envelope.id != expected {
            warn!(id = %envelope.id, expected, "report does not match the running instance, dropped");
            return Ok(vec![]);
        }
        let inputs = instance.inputs().clone();
        self.vnfpp
            .as_mut()
            .ok_or_else(|| HandlerError::recoverable("no profile accumulator"))?
            .add_report(inputs, report.clone());
        info!(id = %envelope.id, "instance report digested");
        self.check()
    }

    /// Compile the profile and raise the result for delivery, tearing down
    /// the deployed scenario first when there is one.
    fn finish(&mut self) -> Result<Vec<Action>, HandlerError> {
        let mut actions = Vec::new();
        let teardown = self
            .instance
            .as_ref()
            .is_some_and(|instance| instance.deployed());
        if teardown {
            match self.deploy(DeployRequest::Stop) {
                Ok(stop) => actions.extend(stop),
                Err(err) => warn!(%err, "scenario teardown failed"),
            }
        }
        let layout = self
            .layout
            .clone()
            .ok_or_else(|| HandlerError::recoverable("no layout to answer"))?;
        let vnfbd = self
            .vnfbd
            .as_ref()
            .ok_or_else(|| HandlerError::recoverable("no descriptor loaded"))?;
        let mut vnfpp = self
            .vnfpp
            .take()
            .ok_or_else(|| HandlerError::recoverable("no profile accumulator"))?;
        vnfpp.compile(layout.id.clone());
        let vnfbr = Vnfbr {
            vnfbd: vnfbd.to_value(),
            vnfpp: vnfpp.to_value(),
        };
        info!(id = %layout.id, "experiment finished, compiling result");
        actions.push(Action::Raise(Event::Result { layout, vnfbr }));
        Ok(actions)
    }

    /// Deliver the VNF-BR to the layout's callback (or back to the layout
    /// requester) and return to the available state.
    fn result(&mut self, layout: Envelope, vnfbr: Vnfbr) -> Vec<Action> {
        let mut reply = Envelope::response_to(layout.id.clone(), Response::Vnfbr(vnfbr));
        let callback = match &layout.payload {
            Payload::Request(Request::Layout(request)) => request.callback.clone(),
            _ => None,
        };
        if let Some(callback) = callback {
            reply.to(callback, layout.prefix.clone());
        } else if let Some(peer) = layout
            .prefix
            .as_deref()
            .and_then(|prefix| self.base.peers.by_prefix(prefix))
        {
            reply.to(peer.address.clone(), Some(peer.prefix.clone()));
        } else {
            warn!(id = %layout.id, "layout has no callback and no known requester, result dropped");
        }
        self.status = Status::Available;
        self.layout = None;
        self.vnfbd = None;
        self.instance = None;
        vec![Action::Deliver(reply)]
    }

    /// Hand the instance's scenario to the deploy entrypoint.
    fn deploy(&mut self, request: DeployRequest) -> Result<Vec<Action>, HandlerError> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| HandlerError::recoverable("no instance to deploy"))?;
        let (plugin, scenario) = instance.deployment();
        let entrypoint = plugin_entrypoint(&plugin).ok_or_else(|| {
            HandlerError::recoverable("deploy requested but the plugin has no entrypoint")
        })?;
        let id = instance.instance_id().unwrap_or_default().to_string();
        let deploy = Deploy {
            scenario,
            callback: Some(self.base.identity.url.clone()),
            request,
            instance: instance.instance_id(),
            continuous: false,
        };
        let mut envelope = Envelope::request_with_id(id.clone(), Request::Deploy(deploy));
        envelope.to(format!("{entrypoint}/{id}"), Some(id));
        info!(%entrypoint, request = ?request, "scenario handed to deploy");
        Ok(vec![Action::Deliver(envelope)])
    }

    /// Apply a deploy acknowledgment: forget the pre-deploy peers and greet
    /// the freshly deployed topology, manager first with the agents and
    /// monitors as its introductions.
    fn built(&mut self, built: &Built) -> Result<Vec<Action>, HandlerError> {
        if !built.ack.running {
            return Err(HandlerError::recoverable("deploy reported not running"));
        }
        let instance = self
            .instance
            .as_mut()
            .ok_or_else(|| HandlerError::recoverable("built without a running instance"))?;
        instance.ack_deploy();
        let contact = contact_from_hosts(&built.ack.info).ok_or_else(|| {
            HandlerError::recoverable("built info names no manager host to greet")
        })?;
        info!(manager = contact.address(), "topology built, re-greeting");
        self.base.peers.clear();
        Ok(vec![Action::Raise(Event::Greetings {
            contacts: vec![contact],
            hello: None,
        })])
    }

    /// After peer updates: a deployed instance still waiting on its manager
    /// resumes tasking once that manager is established.
    fn follow(&mut self) -> Vec<Action> {
        if self.status != Status::Busy {
            return vec![];
        }
        let manager_ready = self
            .base
            .peers
            .by_role(Role::Manager)
            .iter()
            .any(|peer| peer.ack);
        let Some(instance) = self.instance.as_mut() else {
            return vec![];
        };
        if instance.deployed() && !instance.informed() && manager_ready {
            instance.ack_info();
            let input = json!({"id": instance.instance_id()});
            debug!("deployed topology established, resuming tasks");
            return vec![Action::Raise(Event::Tasks { vnfbd: input })];
        }
        vec![]
    }
}

/// Flatten one manager's advertised features into the structure capability
/// matching works on: component id plus the tool set it announced.
fn assistant_structure(features: &Value) -> Value {
    let flatten = |role_key: &str, tool_key: &str| -> Vec<Value> {
        features
            .get(role_key)
            .and_then(Value::as_array)
            .map(|peers| {
                peers
                    .iter()
                    .map(|peer| {
                        json!({
                            "id": peer.get("uuid").cloned().unwrap_or(Value::Null),
                            tool_key: peer
                                .get("features")
                                .and_then(|features| features.get(tool_key))
                                .cloned()
                                .unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    };
    json!({
        "agents": flatten("agents", "probers"),
        "monitors": flatten("monitors", "listeners"),
    })
}

/// The deploy plugin's entrypoint url, either a direct key or a
/// `{input, value}` parameter entry.
fn plugin_entrypoint(plugin: &Value) -> Option<String> {
    if let Some(direct) = plugin.get("entrypoint").and_then(Value::as_str) {
        return Some(direct.to_string());
    }
    plugin
        .get("parameters")
        .and_then(Value::as_array)?
        .iter()
        .find(|entry| entry.get("input").and_then(Value::as_str) == Some("entrypoint"))
        .and_then(|entry| entry.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Derive the greeting contact from the hosts a deploy reported: the
/// manager host becomes the contact, every agent and monitor host one of
/// its introductions. Urls use the fixed management port of each role.
fn contact_from_hosts(info: &Map<String, Value>) -> Option<Contact> {
    let mut manager = None;
    let mut introductions = Vec::new();
    for (host_id, value) in info {
        let Ok(host) = serde_json::from_value::<HostInfo>(value.clone()) else {
            debug!(host = %host_id, "unparseable host entry in built info, skipped");
            continue;
        };
        let (Some(role), Some(management)) = (host.role, host.management) else {
            continue;
        };
        let port = match role {
            Role::Monitor => MONITOR_PORT,
            Role::Agent => AGENT_PORT,
            Role::Manager => MANAGER_PORT,
            Role::Player => continue,
        };
        let url = format!("http://{}:{}", management.ip, port);
        if role == Role::Manager {
            manager = Some(url);
        } else {
            introductions.push(url);
        }
    }
    manager.map(|address| Contact::Nested {
        address,
        contacts: introductions,
    })
}

impl EventHandler for Player {
    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::Request(Method::Hello),
            EventKind::Request(Method::Layout),
            EventKind::Reply(ResponseKind::Info),
            EventKind::Reply(ResponseKind::Report),
            EventKind::Reply(ResponseKind::Built),
            EventKind::Greetings,
            EventKind::Tasks,
            EventKind::Result,
        ]
    }

    fn handle(&mut self, event: Event) -> Result<Vec<Action>, HandlerError> {
        match event {
            Event::Message(envelope) => match envelope.payload.clone() {
                Payload::Request(Request::Hello(hello)) => {
                    Ok(self.base.handle_hello(&envelope, &hello, self.features()))
                }
                Payload::Request(Request::Layout(layout)) => self.layout(&envelope, &layout),
                Payload::Response(Response::Info(info)) => {
                    match self.base.handle_info(&envelope, &info) {
                        InfoOutcome::Pending => Ok(vec![]),
                        InfoOutcome::AnswerHello { hello, applied } => {
                            let mut actions =
                                match self.base.reply_info(&hello, self.features()) {
                                    Some(reply) => vec![Action::Deliver(reply)],
                                    None => vec![],
                                };
                            if applied {
                                actions.extend(self.follow());
                            }
                            Ok(actions)
                        }
                        InfoOutcome::Applied(true) => Ok(self.follow()),
                        InfoOutcome::Applied(false) => Ok(vec![]),
                    }
                }
                Payload::Response(Response::Report(report)) => self.digest(&envelope, &report),
                Payload::Response(Response::Built(built)) => self.built(&built),
                _ => Err(HandlerError::recoverable("unexpected message for player")),
            },
            Event::Greetings { contacts, hello } => Ok(self.base.greetings(&contacts, hello)),
            Event::Tasks { .. } => self.task(),
            Event::Result { layout, vnfbr } => Ok(self.result(layout, vnfbr)),
        }
    }
}
