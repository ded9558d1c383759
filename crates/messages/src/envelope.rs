//! Message envelope: wire body plus transport metadata.

use crate::{ErrorInfo, Method, Request, Response, ResponseKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors from parsing an inbound wire message.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message carries neither a method nor a response tag")]
    MissingTag,
}

/// Generate a fresh wire message id.
///
/// Matches the original scheme: a decimal string drawn from a two-stage
/// random range, so ids are short and non-sequential.
pub fn next_message_id() -> String {
    let mut rng = rand::thread_rng();
    let upper = rng.gen_range(1_000..=10_000);
    rng.gen_range(1..=upper).to_string()
}

/// Current UTC time as a `secs.micros` string, stamped onto responses.
pub fn unix_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Either half of a request/response pair.
#[derive(Debug, Clone)]
pub enum Payload {
    Request(Request),
    Response(Response),
}

/// A protocol message together with its transport metadata.
///
/// Only `id` and the payload (plus `error`/`timestamp` for responses)
/// serialize onto the wire. `sender`, `destination` and `prefix` are filled
/// by the transport layer: the prefix arrives in the URL path on receive and
/// selects the destination path on send.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: String,
    pub payload: Payload,
    /// Response emission time; never set on requests.
    pub timestamp: Option<String>,
    /// Top-level response error; never set on requests.
    pub error: Option<ErrorInfo>,
    /// Remote address observed by the HTTP server.
    pub sender: Option<String>,
    /// Full peer address (`url/prefix`) this message is delivered to.
    pub destination: Option<String>,
    /// Routing prefix for correlation.
    pub prefix: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct RequestWire {
    id: String,
    #[serde(flatten)]
    request: Request,
}

#[derive(Serialize, Deserialize)]
struct ResponseWire {
    id: String,
    #[serde(flatten)]
    response: Response,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl Envelope {
    /// Wrap a request with a freshly generated id.
    pub fn request(request: Request) -> Self {
        Self::request_with_id(next_message_id(), request)
    }

    pub fn request_with_id(id: impl Into<String>, request: Request) -> Self {
        Envelope {
            id: id.into(),
            payload: Payload::Request(request),
            timestamp: None,
            error: None,
            sender: None,
            destination: None,
            prefix: None,
        }
    }

    /// Wrap a response answering the message with `id`; replies reuse the
    /// request's id so the requester can correlate them.
    pub fn response_to(id: impl Into<String>, response: Response) -> Self {
        Envelope {
            id: id.into(),
            payload: Payload::Response(response),
            timestamp: Some(unix_timestamp()),
            error: None,
            sender: None,
            destination: None,
            prefix: None,
        }
    }

    /// Address this message to a peer.
    pub fn to(&mut self, destination: impl Into<String>, prefix: Option<String>) {
        self.destination = Some(destination.into());
        if prefix.is_some() {
            self.prefix = prefix;
        }
    }

    /// Record where this message came in from (remote address and the
    /// routing prefix from the URL path).
    pub fn received_via(&mut self, sender: impl Into<String>, prefix: impl Into<String>) {
        self.sender = Some(sender.into());
        self.prefix = Some(prefix.into());
    }

    pub fn is_reply(&self) -> bool {
        matches!(self.payload, Payload::Response(_))
    }

    pub fn method(&self) -> Option<Method> {
        match &self.payload {
            Payload::Request(request) => Some(request.method()),
            Payload::Response(_) => None,
        }
    }

    pub fn response_kind(&self) -> Option<ResponseKind> {
        match &self.payload {
            Payload::Request(_) => None,
            Payload::Response(response) => Some(response.kind()),
        }
    }

    /// Correlation key `(prefix, id)`; None until the transport stamped a
    /// prefix on this message.
    pub fn correlation_key(&self) -> Option<(String, String)> {
        let prefix = self.prefix.clone()?;
        Some((prefix, self.id.clone()))
    }

    /// Parse an inbound wire body.
    ///
    /// The tag key decides the family; an unknown `method`/`response` value
    /// fails the typed parse and the caller drops the message.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_slice(raw)?;
        if value.get("method").is_some() {
            let wire: RequestWire = serde_json::from_value(value)?;
            Ok(Envelope::request_with_id(wire.id, wire.request))
        } else if value.get("response").is_some() {
            let wire: ResponseWire = serde_json::from_value(value)?;
            let mut envelope = Envelope {
                id: wire.id,
                payload: Payload::Response(wire.response),
                timestamp: wire.timestamp,
                error: wire.error,
                sender: None,
                destination: None,
                prefix: None,
            };
            if envelope.timestamp.is_none() {
                envelope.timestamp = Some(unix_timestamp());
            }
            Ok(envelope)
        } else {
            Err(ParseError::MissingTag)
        }
    }

    /// Serialize the wire body.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match &self.payload {
            Payload::Request(request) => serde_json::to_string(&RequestWire {
                id: self.id.clone(),
                request: request.clone(),
            }),
            Payload::Response(response) => serde_json::to_string(&ResponseWire {
                id: self.id.clone(),
                response: response.clone(),
                error: self.error.clone(),
                timestamp: self.timestamp.clone(),
            }),
        }
    }
}
