//! Foundation types for benchnet.
//!
//! This crate provides the types used throughout the orchestration framework:
//!
//! - **Roles**: the four process kinds (player, manager, agent, monitor)
//! - **Identity**: one per local component and one per known peer, carrying
//!   the routing prefix and capability profile
//! - **Peers**: the per-process registry of known peers with collision-free
//!   prefix assignment
//! - **Contacts**: startup greeting targets, possibly nested for transitive
//!   introduction
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod contact;
mod identity;
mod peers;
mod role;

pub use contact::Contact;
pub use identity::{normalize_url, Identity, PREFIX_MAX, PREFIX_MIN};
pub use peers::{PeerField, Peers};
pub use role::Role;
