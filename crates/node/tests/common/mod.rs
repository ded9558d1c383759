//! In-memory transport harness: routes delivered envelopes between role
//! handlers the way the HTTP transport would, wire serialization included.

use benchnet_core::{Action, Event, EventHandler, EventKind};
use benchnet_messages::Envelope;
use std::collections::{HashSet, VecDeque};

pub struct TestNet<'a> {
    nodes: Vec<(String, &'a mut dyn EventHandler)>,
}

impl<'a> TestNet<'a> {
    pub fn new(nodes: Vec<(String, &'a mut dyn EventHandler)>) -> Self {
        TestNet { nodes }
    }

    /// Inject `event` at the node serving `url`, then route messages until
    /// the network is quiescent. Envelopes addressed outside the harness
    /// (e.g. a layout callback) are returned.
    pub fn raise(&mut self, url: &str, event: Event) -> Vec<Envelope> {
        let index = self.index_of(url);
        let outbox = Self::step(&mut *self.nodes[index].1, event);
        self.route(outbox)
    }

    fn index_of(&self, url: &str) -> usize {
        self.nodes
            .iter()
            .position(|(base, _)| base == url)
            .unwrap_or_else(|| panic!("no node serves {url}"))
    }

    /// Drive one handler over `event`, feeding raised events back to it
    /// while collecting everything it asks to deliver.
    fn step(handler: &mut dyn EventHandler, event: Event) -> Vec<Envelope> {
        let subscriptions: HashSet<EventKind> = handler.subscriptions().into_iter().collect();
        let mut queue = VecDeque::from([event]);
        let mut outbox = Vec::new();
        while let Some(event) = queue.pop_front() {
            if !subscriptions.contains(&event.kind()) {
                continue;
            }
            let actions = handler
                .handle(event)
                .unwrap_or_else(|err| panic!("handler failed: {err}"));
            for action in actions {
                match action {
                    Action::Deliver(envelope) => outbox.push(envelope),
                    Action::Raise(event) => queue.push_back(event),
                    Action::Defer { .. } => {}
                }
            }
        }
        outbox
    }

    fn route(&mut self, outbox: Vec<Envelope>) -> Vec<Envelope> {
        let mut pending = VecDeque::from(outbox);
        let mut external = Vec::new();
        while let Some(envelope) = pending.pop_front() {
            let destination = envelope
                .destination
                .clone()
                .expect("delivered envelope has a destination");
            let Some((base, prefix)) = destination.rsplit_once('/') else {
                external.push(envelope);
                continue;
            };
            let Some(position) = self.nodes.iter().position(|(url, _)| url == base) else {
                external.push(envelope);
                continue;
            };
            // Same round trip the HTTP transport performs.
            let wire = envelope.to_wire().expect("envelope serializes");
            let mut parsed = Envelope::parse(wire.as_bytes()).expect("envelope parses");
            parsed.received_via("127.0.0.1", prefix);
            pending.extend(Self::step(
                &mut *self.nodes[position].1,
                Event::Message(parsed),
            ));
        }
        external
    }
}
