//! Shared component base: identity, peer registry and the handshake.
//!
//! Every role owns a [`Base`] and delegates `hello`/`info`/greetings
//! handling to it. The handshake is symmetric: a component greets a contact
//! with `hello`, the contact answers with `info`, and both sides converge on
//! one routing prefix for the pairing. A `hello` carrying contacts is not
//! answered right away: the receiver first greets the introduced peers and
//! only replies once every introduction was acknowledged, so its `info` can
//! already advertise them.

use benchnet_core::{Action, Correlator, Event};
use benchnet_messages::{Envelope, Hello, Info, Payload, Request, Response};
use benchnet_types::{Contact, Identity, Peers};
use serde_json::Value;
use tracing::{debug, info, warn};

/// What handling an `info` amounted to.
#[derive(Debug)]
pub enum InfoOutcome {
    /// Part of a tracked fan-out that is still missing replies.
    Pending,
    /// The fan-out completed; `hello` now wants its `info` reply, built
    /// against the caller's current features.
    AnswerHello { hello: Envelope, applied: bool },
    /// A standalone info; the flag says whether a peer record was updated.
    Applied(bool),
}

pub struct Base {
    pub identity: Identity,
    pub peers: Peers,
    pub correlator: Correlator,
}

impl Base {
    pub fn new(identity: Identity) -> Self {
        Base {
            identity,
            peers: Peers::new(),
            correlator: Correlator::default(),
        }
    }

    /// Greet `contacts` with one `hello` each, forwarding sub-contacts for
    /// transitive introduction.
    ///
    /// When the greeting was caused by a received `hello` (a peer asked us
    /// to introduce ourselves around), that hello is tracked against the
    /// fan-out so its `info` reply waits for every introduction; a startup
    /// greeting has no such cause and is not tracked.
    pub fn greetings(&mut self, contacts: &[Contact], hello: Option<Envelope>) -> Vec<Action> {
        let mut outputs = Vec::new();
        for contact in contacts {
            let (address, prefix) = {
                let peer = self.peers.create(contact.address());
                (peer.address.clone(), peer.prefix.clone())
            };
            let mut envelope = Envelope::request(Request::Hello(Hello {
                uuid: self.identity.uuid.clone(),
                prefix: Some(prefix.clone()),
                role: self.identity.role,
                url: Some(self.identity.url.clone()),
                contacts: contact
                    .sub_contacts()
                    .iter()
                    .map(|address| Contact::Address(address.clone()))
                    .collect(),
            }));
            envelope.to(address, Some(prefix));
            info!(contact = contact.address(), id = %envelope.id, "greeting peer");
            outputs.push(envelope);
        }
        if let Some(hello) = hello {
            self.correlator.track(&hello, &outputs);
        }
        outputs.into_iter().map(Action::Deliver).collect()
    }

    /// Apply a received `hello`: register the sender and either answer with
    /// our `info` or, when the hello carries contacts, greet those first.
    pub fn handle_hello(&mut self, envelope: &Envelope, hello: &Hello, features: Value) -> Vec<Action> {
        let Some(url) = hello.url.as_deref() else {
            warn!(id = %envelope.id, "hello without a sender url, dropped");
            return vec![];
        };
        self.peers
            .hello_received(url, hello.uuid.clone(), hello.prefix.clone(), hello.role);
        if hello.contacts.is_empty() {
            match self.reply_info(envelope, features) {
                Some(reply) => vec![Action::Deliver(reply)],
                None => vec![],
            }
        } else {
            debug!(
                id = %envelope.id,
                contacts = hello.contacts.len(),
                "hello carries introductions, deferring info reply"
            );
            vec![Action::Raise(Event::Greetings {
                contacts: hello.contacts.clone(),
                hello: Some(envelope.clone()),
            })]
        }
    }

    /// Apply a received `info`.
    ///
    /// A reply belonging to a tracked greeting fan-out is collected until
    /// the whole fan-out is in, then every collected info is applied and
    /// the original `hello` handed back so the role can finally answer it
    /// with its then-current features. A standalone info (the common case)
    /// just acknowledges its peer.
    pub fn handle_info(&mut self, envelope: &Envelope, info: &Info) -> InfoOutcome {
        if self.correlator.ack(envelope) {
            if !self.correlator.all_acked(envelope) {
                return InfoOutcome::Pending;
            }
            let Some(key) = self.correlator.input_key_for(envelope) else {
                return InfoOutcome::Pending;
            };
            let Some((hello, replies)) = self.correlator.drain(&key) else {
                return InfoOutcome::Pending;
            };
            let mut applied = false;
            for reply in &replies {
                if let Payload::Response(Response::Info(peer_info)) = &reply.payload {
                    applied |= self.apply_info(reply, peer_info);
                }
            }
            info!(id = %hello.id, peers = replies.len(), "introductions complete, answering hello");
            InfoOutcome::AnswerHello { hello, applied }
        } else {
            InfoOutcome::Applied(self.apply_info(envelope, info))
        }
    }

    fn apply_info(&mut self, envelope: &Envelope, info: &Info) -> bool {
        let url = match &info.url {
            Some(url) => url.clone(),
            None => {
                let Some(peer) = envelope
                    .prefix
                    .as_deref()
                    .and_then(|prefix| self.peers.by_prefix(prefix))
                else {
                    warn!(id = %envelope.id, "info from an unknown peer, dropped");
                    return false;
                };
                peer.url.clone()
            }
        };
        self.peers.info_received(
            &url,
            info.uuid.clone(),
            info.role,
            info.features.clone(),
            info.prefix.clone(),
        )
    }

    /// Build the `info` answering `request`, stamped to the requester's
    /// address with the (possibly renumbered) pairing prefix.
    pub fn reply_info(&self, request: &Envelope, features: Value) -> Option<Envelope> {
        let peer = match &request.payload {
            Payload::Request(Request::Hello(hello)) => {
                hello.url.as_deref().and_then(|url| self.peers.get(url))
            }
            _ => None,
        }
        .or_else(|| {
            request
                .prefix
                .as_deref()
                .and_then(|prefix| self.peers.by_prefix(prefix))
        })?;
        let info = Info {
            uuid: self.identity.uuid.clone(),
            prefix: Some(peer.prefix.clone()),
            role: self.identity.role,
            url: Some(self.identity.url.clone()),
            features,
        };
        let mut reply = Envelope::response_to(request.id.clone(), Response::Info(info));
        reply.to(peer.address.clone(), Some(peer.prefix.clone()));
        Some(reply)
    }

    /// Stamp `response` as the answer to `request`, addressed to the peer
    /// the request's routing prefix belongs to.
    pub fn reply_to(&self, request: &Envelope, response: Response) -> Option<Envelope> {
        let peer = request
            .prefix
            .as_deref()
            .and_then(|prefix| self.peers.by_prefix(prefix))?;
        let mut reply = Envelope::response_to(request.id.clone(), response);
        reply.to(peer.address.clone(), Some(peer.prefix.clone()));
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchnet_types::Role;
    use serde_json::json;

    fn base(url: &str, uuid: &str, role: Role) -> Base {
        Base::new(Identity::local(url, uuid, role))
    }

    fn delivered(actions: &[Action]) -> Vec<&Envelope> {
        actions
            .iter()
            .filter_map(|action| match action {
                Action::Deliver(envelope) => Some(envelope),
                _ => None,
            })
            .collect()
    }

    /// Re-parse an outbound envelope as the receiving side would see it.
    fn transported(envelope: &Envelope) -> Envelope {
        let destination = envelope.destination.clone().unwrap();
        let (_, prefix) = destination.rsplit_once('/').unwrap();
        let mut parsed = Envelope::parse(envelope.to_wire().unwrap().as_bytes()).unwrap();
        parsed.received_via("127.0.0.1", prefix);
        parsed
    }

    #[test]
    fn test_handshake_converges_on_one_prefix() {
        let mut agent = base("http://10.0.0.2:8988", "agent-1", Role::Agent);
        let mut manager = base("http://10.0.0.1:8989", "mgr-1", Role::Manager);

        let greeting = agent.greetings(&[Contact::from("http://10.0.0.1:8989")], None);
        let hello = transported(delivered(&greeting)[0]);
        let Payload::Request(Request::Hello(payload)) = hello.payload.clone() else {
            panic!("expected a hello request");
        };

        let answer = manager.handle_hello(&hello, &payload, json!({"agents": []}));
        let info = transported(delivered(&answer)[0]);
        let Payload::Response(Response::Info(payload)) = info.payload.clone() else {
            panic!("expected an info reply");
        };

        assert!(matches!(
            agent.handle_info(&info, &payload),
            InfoOutcome::Applied(true)
        ));

        let manager_peer = agent.peers.get("http://10.0.0.1:8989").unwrap();
        assert!(manager_peer.ack);
        assert_eq!(manager_peer.uuid.as_deref(), Some("mgr-1"));
        let agent_peer = manager.peers.get("http://10.0.0.2:8988").unwrap();
        assert_eq!(agent_peer.prefix, manager_peer.prefix);
    }

    #[test]
    fn test_hello_with_contacts_defers_info() {
        let mut manager = base("http://10.0.0.1:8989", "mgr-1", Role::Manager);

        let mut hello_env = Envelope::request(Request::Hello(Hello {
            uuid: Some("player-1".into()),
            prefix: Some("700".into()),
            role: Some(Role::Player),
            url: Some("http://10.0.0.9:8990".into()),
            contacts: vec![Contact::from("http://10.0.0.2:8988")],
        }));
        hello_env.received_via("10.0.0.9", "700");
        let Payload::Request(Request::Hello(payload)) = hello_env.payload.clone() else {
            unreachable!();
        };

        let actions = manager.handle_hello(&hello_env, &payload, json!({}));
        assert!(delivered(&actions).is_empty());
        assert!(matches!(
            actions[0],
            Action::Raise(Event::Greetings { ref hello, .. }) if hello.is_some()
        ));

        // The deferred greeting fan-out tracks the hello; once the agent's
        // info arrives, the original hello is finally answered.
        let greeting = manager.greetings(
            &[Contact::from("http://10.0.0.2:8988")],
            Some(hello_env.clone()),
        );
        let fanned = transported(delivered(&greeting)[0]);

        let mut agent_info = Envelope::response_to(
            fanned.id.clone(),
            Response::Info(Info {
                uuid: Some("agent-1".into()),
                prefix: None,
                role: Some(Role::Agent),
                url: Some("http://10.0.0.2:8988".into()),
                features: json!({"probers": {}}),
            }),
        );
        agent_info.received_via("10.0.0.2", fanned.prefix.clone().unwrap());
        let Payload::Response(Response::Info(payload)) = agent_info.payload.clone() else {
            unreachable!();
        };

        let InfoOutcome::AnswerHello { hello, applied } = manager.handle_info(&agent_info, &payload)
        else {
            panic!("expected the fan-out to complete");
        };
        assert!(applied);
        let reply = manager.reply_info(&hello, json!({})).unwrap();
        assert_eq!(reply.id, hello_env.id);
        assert!(manager.peers.get("http://10.0.0.2:8988").unwrap().ack);
        assert!(manager.correlator.is_empty());
    }

    #[test]
    fn test_startup_greeting_is_not_tracked() {
        let mut agent = base("http://10.0.0.2:8988", "agent-1", Role::Agent);
        agent.greetings(&[Contact::from("http://10.0.0.1:8989")], None);
        assert!(agent.correlator.is_empty());
    }
}
