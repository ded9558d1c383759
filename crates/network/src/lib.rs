//! HTTP transport for the orchestration protocol.
//!
//! Inbound: an axum server accepting `POST /{prefix}` JSON bodies and
//! feeding parsed envelopes to the event loop. Outbound: a delivery loop
//! draining the event loop's output channel and POSTing each message to its
//! destination.

mod delivery;
mod server;

pub use delivery::DeliveryLoop;
pub use server::{create_router, serve, ServerError};
