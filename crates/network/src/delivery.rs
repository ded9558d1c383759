//! Outbound delivery loop.
//!
//! Runs independently of the event loop: it drains the outbound queue and
//! POSTs each message's JSON body to its destination. A missing destination
//! or a connection failure drops the message with a log; nothing is
//! retried.

use benchnet_core::IDLE_POLL;
use benchnet_messages::Envelope;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Consumes the event loop's outbound channel and performs the HTTP POSTs.
pub struct DeliveryLoop {
    outbound: mpsc::UnboundedReceiver<Envelope>,
    client: reqwest::Client,
}

impl DeliveryLoop {
    pub fn new(outbound: mpsc::UnboundedReceiver<Envelope>) -> Self {
        DeliveryLoop {
            outbound,
            client: reqwest::Client::new(),
        }
    }

    /// Run until the outbound channel closes.
    pub async fn run(mut self) {
        debug!("delivery loop started");
        loop {
            match self.outbound.try_recv() {
                Ok(envelope) => self.dispatch(envelope).await,
                Err(mpsc::error::TryRecvError::Empty) => {
                    tokio::time::sleep(IDLE_POLL).await;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    info!("outbound queue closed");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, envelope: Envelope) {
        let Some(destination) = envelope.destination.clone() else {
            debug!(id = %envelope.id, "no destination for message, dropped");
            return;
        };
        let body = match envelope.to_wire() {
            Ok(body) => body,
            Err(err) => {
                warn!(id = %envelope.id, %err, "could not serialize message, dropped");
                return;
            }
        };
        match self
            .client
            .post(&destination)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => {
                info!(%destination, status = %response.status(), "message posted");
            }
            Err(err) => {
                info!(%destination, "could not establish connection");
                debug!(%err, "delivery error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loop_stops_when_queue_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);
        tokio::time::timeout(std::time::Duration::from_secs(1), DeliveryLoop::new(rx).run())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_without_destination_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let envelope = Envelope::request(benchnet_messages::Request::Hello(
            benchnet_messages::Hello {
                uuid: None,
                prefix: None,
                role: None,
                url: None,
                contacts: vec![],
            },
        ));
        tx.send(envelope).unwrap();
        drop(tx);
        // No destination: the loop logs, drops and exits cleanly.
        tokio::time::timeout(std::time::Duration::from_secs(1), DeliveryLoop::new(rx).run())
            .await
            .unwrap();
    }
}
