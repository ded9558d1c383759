//! Registry of known peers with collision-free prefix assignment.

use crate::{Identity, Role};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Typed lookup fields for [`Peers::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerField {
    Url,
    Uuid,
    Role,
    Prefix,
}

/// Tracks all peers a process knows about, keyed by base URL, with a
/// secondary index from routing prefix to URL.
///
/// Invariant: every tracked peer holds a prefix unique within this registry.
/// Registering a peer whose prefix collides transparently re-randomizes the
/// newcomer's prefix and re-indexes it.
#[derive(Debug, Default)]
pub struct Peers {
    peers: HashMap<String, Identity>,
    prefixes: HashMap<String, String>,
}

impl Peers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or return the already-registered) peer at `url`, assigning
    /// a prefix no other tracked peer holds.
    pub fn create(&mut self, url: &str) -> &Identity {
        if !self.peers.contains_key(url) {
            let mut peer = Identity::new(url);
            while self.prefixes.contains_key(&peer.prefix) {
                peer.randomize_prefix();
            }
            self.prefixes.insert(peer.prefix.clone(), url.to_string());
            debug!(url, prefix = %peer.prefix, "peer registered");
            self.peers.insert(url.to_string(), peer);
        }
        &self.peers[url]
    }

    /// Apply a received `hello` payload: create or update the peer for the
    /// sender's URL and adopt the prefix the sender chose for this pairing.
    ///
    /// If the proposed prefix collides with another tracked peer the local
    /// side renumbers it; the renumbered value travels back in our `info`
    /// reply.
    pub fn hello_received(
        &mut self,
        url: &str,
        uuid: Option<String>,
        prefix: Option<String>,
        role: Option<Role>,
    ) -> &Identity {
        self.create(url);
        if let Some(prefix) = prefix {
            self.adopt_prefix(url, prefix);
        }
        let peer = self.peers.get_mut(url).expect("peer registered above");
        if uuid.is_some() {
            peer.uuid = uuid;
        }
        if role.is_some() {
            peer.role = role;
        }
        info!(
            url,
            uuid = peer.uuid.as_deref().unwrap_or("?"),
            role = peer.role.map(|r| r.as_str()).unwrap_or("?"),
            prefix = %peer.prefix,
            "peer hello"
        );
        &self.peers[url]
    }

    /// Apply a received `info` payload: mark the peer acknowledged, record
    /// its capability profile, and follow a remote prefix renumbering.
    ///
    /// Returns false when no peer is tracked for the sender's URL.
    pub fn info_received(
        &mut self,
        url: &str,
        uuid: Option<String>,
        role: Option<Role>,
        features: Value,
        prefix: Option<String>,
    ) -> bool {
        if !self.peers.contains_key(url) {
            return false;
        }
        if let Some(prefix) = prefix {
            self.update_prefix(url, prefix);
        }
        let peer = self.peers.get_mut(url).expect("checked above");
        if uuid.is_some() {
            peer.uuid = uuid;
        }
        if role.is_some() {
            peer.role = role;
        }
        peer.features = features;
        peer.mark_ack();
        info!(
            url,
            uuid = peer.uuid.as_deref().unwrap_or("?"),
            prefix = %peer.prefix,
            "peer info"
        );
        true
    }

    /// Adopt a remotely-proposed prefix, renumbering on collision with
    /// another tracked peer.
    fn adopt_prefix(&mut self, url: &str, proposed: String) {
        let taken_by_other = self
            .prefixes
            .get(&proposed)
            .is_some_and(|holder| holder != url);
        if taken_by_other {
            debug!(url, prefix = %proposed, "prefix collision, renumbering");
            let peer = self.peers.get_mut(url).expect("caller registered peer");
            self.prefixes.remove(&peer.prefix);
            peer.randomize_prefix();
            while self.prefixes.contains_key(&peer.prefix) {
                peer.randomize_prefix();
            }
            self.prefixes.insert(peer.prefix.clone(), url.to_string());
        } else {
            self.update_prefix(url, proposed);
        }
    }

    /// Re-index a peer under a new prefix.
    fn update_prefix(&mut self, url: &str, new_prefix: String) {
        let peer = match self.peers.get_mut(url) {
            Some(peer) => peer,
            None => return,
        };
        if peer.prefix == new_prefix {
            return;
        }
        self.prefixes.remove(&peer.prefix);
        peer.set_prefix(new_prefix.clone());
        self.prefixes.insert(new_prefix, url.to_string());
    }

    /// Look up a peer by its routing prefix.
    pub fn by_prefix(&self, prefix: &str) -> Option<&Identity> {
        let url = self.prefixes.get(prefix)?;
        self.peers.get(url)
    }

    /// Point lookup: first peer whose `field` equals `value`.
    pub fn find(&self, field: PeerField, value: &str) -> Option<&Identity> {
        self.peers
            .values()
            .find(|peer| Self::matches(peer, field, value))
    }

    /// Multi-value lookup: all peers whose `field` equals `value`.
    pub fn find_all(&self, field: PeerField, value: &str) -> Vec<&Identity> {
        self.peers
            .values()
            .filter(|peer| Self::matches(peer, field, value))
            .collect()
    }

    /// All peers holding `role`.
    pub fn by_role(&self, role: Role) -> Vec<&Identity> {
        self.find_all(PeerField::Role, role.as_str())
    }

    fn matches(peer: &Identity, field: PeerField, value: &str) -> bool {
        match field {
            PeerField::Url => peer.url == value,
            PeerField::Uuid => peer.uuid.as_deref() == Some(value),
            PeerField::Role => peer.role.map(|r| r.as_str()) == Some(value),
            PeerField::Prefix => peer.prefix == value,
        }
    }

    pub fn get(&self, url: &str) -> Option<&Identity> {
        self.peers.get(url)
    }

    pub fn remove(&mut self, url: &str) -> Option<Identity> {
        let peer = self.peers.remove(url)?;
        self.prefixes.remove(&peer.prefix);
        Some(peer)
    }

    /// Drop every tracked peer and prefix.
    pub fn clear(&mut self) {
        self.peers.clear();
        self.prefixes.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.peers.values()
    }
}
