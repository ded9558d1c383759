//! Component-side handler interface for the event loop.

use crate::event::{Event, EventKind};
use benchnet_messages::Envelope;
use thiserror::Error;

/// Handler failure, split by whether the loop keeps running.
///
/// A recoverable error is logged and the offending event dropped; a fatal
/// one stops the loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Recoverable(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        HandlerError::Recoverable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        HandlerError::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal(_))
    }
}

/// What a handler asks the loop to do after processing an event.
#[derive(Debug)]
pub enum Action {
    /// Hand a message to the outbound delivery loop.
    Deliver(Envelope),
    /// Put another event on this component's own queue.
    Raise(Event),
    /// Park an event on the agenda until `trigger` occurs.
    Defer { trigger: EventKind, event: Event },
}

/// A component driven by the event loop.
///
/// The subscription list is read once when the loop starts; events of other
/// kinds only ever consult the agenda.
pub trait EventHandler: Send {
    /// Event kinds this component handles.
    fn subscriptions(&self) -> Vec<EventKind>;

    /// Process one event, returning follow-up actions.
    fn handle(&mut self, event: Event) -> Result<Vec<Action>, HandlerError>;
}

impl EventHandler for Box<dyn EventHandler> {
    fn subscriptions(&self) -> Vec<EventKind> {
        (**self).subscriptions()
    }

    fn handle(&mut self, event: Event) -> Result<Vec<Action>, HandlerError> {
        (**self).handle(event)
    }
}
