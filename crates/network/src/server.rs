//! Inbound HTTP server.
//!
//! Every peer exchange is an HTTP POST with a JSON body to `/{prefix}`,
//! where the path segment is the routing prefix the sender holds for this
//! pairing. A parseable body is acknowledged with `"Ack"` and handed to the
//! event loop; anything else is rejected without reaching a handler.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use benchnet_core::{Event, EventSender};
use benchnet_messages::Envelope;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from the message server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to serve on {addr}: {source}")]
    Serve {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Shared state for the message routes.
#[derive(Clone)]
pub struct ServerState {
    events: EventSender,
}

/// Build the message router: one POST route keyed by routing prefix.
pub fn create_router(events: EventSender) -> Router {
    Router::new()
        .route("/{prefix}", post(handle_message))
        .with_state(ServerState { events })
}

async fn handle_message(
    State(state): State<ServerState>,
    Path(prefix): Path<String>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> impl IntoResponse {
    match Envelope::parse(&body) {
        Ok(mut envelope) => {
            debug!(%remote, %prefix, id = %envelope.id, "message received");
            envelope.received_via(remote.ip().to_string(), prefix);
            state.events.raise(Event::Message(envelope));
            (StatusCode::OK, "Ack")
        }
        Err(err) => {
            warn!(%remote, %prefix, %err, "rejecting message payload");
            (StatusCode::BAD_REQUEST, "Bad Payload")
        }
    }
}

/// Serve the message router on `addr` until the task is cancelled.
pub async fn serve(addr: SocketAddr, events: EventSender) -> Result<(), ServerError> {
    let router = create_router(events);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Serve { addr, source })?;
    info!(%addr, "message server listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|source| ServerError::Serve { addr, source })
}
