//! Events flowing through a component's queue.

use benchnet_messages::{Envelope, Method, Payload, ResponseKind, Vnfbr};
use benchnet_types::Contact;
use serde_json::Value;
use std::fmt;

/// Dispatch key for an event: handler tables and agenda entries are keyed by
/// kind, never by event instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An inbound request, keyed by its method.
    Request(Method),
    /// An inbound reply, keyed by its response tag.
    Reply(ResponseKind),
    /// Contacts to greet.
    Greetings,
    /// A benchmark descriptor instance ready to be scheduled.
    Tasks,
    /// A finished benchmark result ready for delivery.
    Result,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Request(method) => write!(f, "request/{method}"),
            EventKind::Reply(kind) => write!(f, "reply/{kind}"),
            EventKind::Greetings => f.write_str("greetings"),
            EventKind::Tasks => f.write_str("tasks"),
            EventKind::Result => f.write_str("result"),
        }
    }
}

/// A unit of work for the event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// A message delivered by the transport.
    Message(Envelope),
    /// Peers to introduce ourselves to. When the greeting was caused by a
    /// received `hello` carrying contacts, that hello rides along so the
    /// info reply can be correlated with the fan-out.
    Greetings {
        contacts: Vec<Contact>,
        hello: Option<Envelope>,
    },
    /// One multiplexed descriptor instance to run.
    Tasks { vnfbd: Value },
    /// The compiled benchmark report, paired with the layout request that
    /// asked for it.
    Result { layout: Envelope, vnfbr: Vnfbr },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Message(envelope) => match &envelope.payload {
                Payload::Request(request) => EventKind::Request(request.method()),
                Payload::Response(response) => EventKind::Reply(response.kind()),
            },
            Event::Greetings { .. } => EventKind::Greetings,
            Event::Tasks { .. } => EventKind::Tasks,
            Event::Result { .. } => EventKind::Result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchnet_messages::{Hello, Info, Request, Response};

    #[test]
    fn test_event_kind_follows_payload() {
        let request = Event::Message(Envelope::request(Request::Hello(Hello {
            uuid: None,
            prefix: None,
            role: None,
            url: None,
            contacts: vec![],
        })));
        assert_eq!(request.kind(), EventKind::Request(Method::Hello));

        let reply = Event::Message(Envelope::response_to(
            "1",
            Response::Info(Info {
                uuid: None,
                prefix: None,
                role: None,
                url: None,
                features: Value::Null,
            }),
        ));
        assert_eq!(reply.kind(), EventKind::Reply(ResponseKind::Info));
    }
}
