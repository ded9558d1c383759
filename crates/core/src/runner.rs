//! The component event loop.
//!
//! One cooperative loop per process: events are popped without blocking and
//! dispatched to the component's handler; an empty queue just sleeps and
//! polls again. Outbound messages leave through a channel consumed by the
//! transport's delivery loop.

use crate::agenda::Agenda;
use crate::event::Event;
use crate::handler::{Action, EventHandler, HandlerError};
use benchnet_messages::Envelope;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Poll interval when the event queue is empty.
pub const IDLE_POLL: Duration = Duration::from_millis(500);

/// Cloneable handle for injecting events into a running loop.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// A standalone queue endpoint pair, for wiring a transport to a queue
    /// that something other than an [`EventLoop`] consumes.
    pub fn channel() -> (EventSender, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender { tx }, rx)
    }

    /// Enqueue an event; silently dropped once the loop is gone.
    pub fn raise(&self, event: Event) {
        if self.tx.send(event).is_err() {
            warn!("event loop closed, event dropped");
        }
    }
}

/// Drives one component's handler over its event queue.
pub struct EventLoop<H> {
    handler: H,
    subscriptions: HashSet<crate::event::EventKind>,
    agenda: Agenda,
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl<H: EventHandler> EventLoop<H> {
    /// Build a loop around `handler`. The subscription table is fixed here;
    /// the returned sender feeds the queue and the receiver yields messages
    /// for the delivery loop.
    pub fn new(handler: H) -> (Self, EventSender, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outbound, delivery) = mpsc::unbounded_channel();
        let subscriptions = handler.subscriptions().into_iter().collect();
        let event_loop = EventLoop {
            handler,
            subscriptions,
            agenda: Agenda::default(),
            rx,
            tx: tx.clone(),
            outbound,
        };
        (event_loop, EventSender { tx }, delivery)
    }

    /// Run until a fatal handler error or until every sender is dropped.
    pub async fn run(mut self) {
        info!("event loop started");
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if self.dispatch(event).is_err() {
                        break;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => {
                    tokio::time::sleep(IDLE_POLL).await;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    info!("event queue closed");
                    break;
                }
            }
        }
        info!("event loop stopped");
    }

    fn dispatch(&mut self, event: Event) -> Result<(), ()> {
        let kind = event.kind();
        if self.subscriptions.contains(&kind) {
            debug!(%kind, "dispatching event");
            match self.handler.handle(event) {
                Ok(actions) => self.apply(actions),
                Err(err) if err.is_fatal() => {
                    error!(%kind, %err, "handler failed, stopping");
                    return Err(());
                }
                Err(err) => {
                    warn!(%kind, %err, "handler failed, event dropped");
                }
            }
        } else {
            let due = self.agenda.take_due(kind);
            if due.is_empty() {
                debug!(%kind, "no handler and nothing scheduled, event dropped");
            } else {
                info!(%kind, count = due.len(), "trigger fired scheduled events");
                for event in due {
                    let _ = self.tx.send(event);
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Deliver(envelope) => {
                    if self.outbound.send(envelope).is_err() {
                        warn!("delivery loop closed, message dropped");
                    }
                }
                Action::Raise(event) => {
                    let _ = self.tx.send(event);
                }
                Action::Defer { trigger, event } => {
                    self.agenda.schedule(trigger, event);
                }
            }
        }
    }
}
