//! Component identity and routing prefix.

use crate::Role;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inclusive lower bound for routing prefixes.
pub const PREFIX_MIN: u32 = 100;
/// Inclusive upper bound for routing prefixes.
pub const PREFIX_MAX: u32 = 9_999;

/// Normalize a base URL to end with a trailing slash.
pub fn normalize_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Identity of a benchnet component: one per local process, one per known
/// peer.
///
/// The `prefix` is a per-peer routing token; appending it to the peer's base
/// `url` yields the `address` messages are POSTed to. A process assigns each
/// of its peers a prefix unique within its own registry, so an inbound
/// request's path identifies which peer relationship it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub url: String,
    pub uuid: Option<String>,
    pub role: Option<Role>,
    /// Decimal routing token, unique among a process's tracked peers.
    pub prefix: String,
    /// `url` (trailing-slash normalized) + `prefix`.
    pub address: String,
    /// Set once the peer answered our hello with its info.
    #[serde(default, skip_serializing)]
    pub ack: bool,
    /// Free-form capability profile advertised in `info` replies.
    #[serde(default)]
    pub features: Value,
}

impl Identity {
    /// Create an identity with a freshly randomized prefix.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let mut identity = Identity {
            url,
            uuid: None,
            role: None,
            prefix: String::new(),
            address: String::new(),
            ack: false,
            features: Value::Null,
        };
        identity.randomize_prefix();
        identity
    }

    /// Create the local process identity.
    pub fn local(url: impl Into<String>, uuid: impl Into<String>, role: Role) -> Self {
        let mut identity = Identity::new(url);
        identity.uuid = Some(uuid.into());
        identity.role = Some(role);
        identity
    }

    /// Assign a new random prefix in [`PREFIX_MIN`], [`PREFIX_MAX`] and
    /// refresh the derived address.
    pub fn randomize_prefix(&mut self) {
        let prefix = rand::thread_rng().gen_range(PREFIX_MIN..=PREFIX_MAX);
        self.set_prefix(prefix.to_string());
    }

    /// Set the prefix (e.g. after the remote renumbers it) and refresh the
    /// derived address.
    pub fn set_prefix(&mut self, prefix: String) {
        self.prefix = prefix;
        self.address = format!("{}{}", normalize_url(&self.url), self.prefix);
    }

    /// Mark the peer as acknowledged (handshake established).
    pub fn mark_ack(&mut self) {
        self.ack = true;
    }
}
