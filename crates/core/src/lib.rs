//! Core event machinery shared by every component role.
//!
//! A component is a single [`EventHandler`] driven by one [`EventLoop`].
//! Inbound transport messages and internal triggers arrive as [`Event`]s;
//! handlers answer with [`Action`]s that deliver messages, raise further
//! events or defer events on the [`Agenda`]. The [`Correlator`] ties
//! fan-out requests back to the inbound message that caused them.

mod agenda;
mod correlation;
mod event;
mod handler;
mod runner;

pub use agenda::Agenda;
pub use correlation::{CorrelationKey, Correlator};
pub use event::{Event, EventKind};
pub use handler::{Action, EventHandler, HandlerError};
pub use runner::{EventLoop, EventSender, IDLE_POLL};
