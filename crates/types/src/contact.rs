//! Greeting contacts.

use serde::{Deserialize, Serialize};

/// A startup greeting target.
///
/// A plain contact is just an address. A nested contact additionally carries
/// sub-contacts that the receiver should greet on our behalf (transitive
/// introduction): a player greeting a manager can hand it the agent and
/// monitor addresses the manager should establish itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Contact {
    /// Bare address string.
    Address(String),
    /// Address plus contacts to be forwarded to it.
    Nested {
        address: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        contacts: Vec<String>,
    },
}

impl Contact {
    /// The address to greet.
    pub fn address(&self) -> &str {
        match self {
            Contact::Address(addr) => addr,
            Contact::Nested { address, .. } => address,
        }
    }

    /// Sub-contacts to forward, empty for bare contacts.
    pub fn sub_contacts(&self) -> &[String] {
        match self {
            Contact::Address(_) => &[],
            Contact::Nested { contacts, .. } => contacts,
        }
    }
}

impl From<&str> for Contact {
    fn from(addr: &str) -> Self {
        Contact::Address(addr.to_string())
    }
}
