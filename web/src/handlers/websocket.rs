//! WebSocket stream of queue events.
//!
//! Displays and desk screens subscribe here instead of polling.
//!
//! # Architecture
//!
//! ```text
//! Client          WebSocket Handler          QueueStore
//!   │                    │                        │
//!   ├─ Connect ─────────>│                        │
//!   │                    ├─ subscribe() ─────────>│
//!   │                    │                        │
//!   │                    │<── TicketIssued ───────┤
//!   │<─ Receive Event ───┤                        │
//!   │                    │<── TicketCalled ───────┤
//!   │<─ Receive Event ───┤                        │
//! ```
//!
//! # Message Protocol
//!
//! **Server → Client (Event):**
//! ```json
//! {
//!   "type": "event",
//!   "event": { "type": "ticket_called", "called": { ... } }
//! }
//! ```
//!
//! **Server → Client (Error):**
//! ```json
//! {
//!   "type": "error",
//!   "message": "Missed 12 events"
//! }
//! ```
//!
//! A client that receives an error should re-fetch `/api/display` and
//! `/api/tickets`; the stream itself continues.

use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use walkup_core::queue::QueueEvent;
use walkup_runtime::QueueStore;

/// WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsMessage {
    /// A committed queue change
    Event {
        /// The event
        event: QueueEvent,
    },
    /// Error message
    Error {
        /// Error description
        message: String,
    },
    /// Ping message (keep-alive)
    Ping,
    /// Pong response
    Pong,
}

/// Upgrade to a WebSocket that streams [`QueueEvent`]s.
///
/// # Endpoint
///
/// ```text
/// GET /ws
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state.store))
}

/// Handle WebSocket connection lifecycle.
///
/// Spawns two concurrent tasks:
/// 1. **Sender**: Stream queue events to the client
/// 2. **Receiver**: Answer pings and notice when the client leaves
#[allow(clippy::cognitive_complexity)] // WebSocket handler with multiple message types
async fn handle_socket(socket: WebSocket, store: Arc<QueueStore>) {
    info!("WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let mut events = store.subscribe();
    let (pong_tx, mut pong_rx) = tokio::sync::mpsc::channel::<()>(4);

    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => WsMessage::Event { event },
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "WebSocket subscriber lagged behind");
                        WsMessage::Error {
                            message: format!("Missed {missed} events"),
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(()) = pong_rx.recv() => WsMessage::Pong,
            };

            let message = match serde_json::to_string(&outgoing) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    error!(error = %e, "Failed to serialize queue event");
                    continue;
                }
            };

            if sender.send(message).await.is_err() {
                // Client disconnected
                break;
            }
        }

        debug!("WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<WsMessage>(&text) {
                    Ok(WsMessage::Ping) => {
                        debug!("Received ping from client");
                        if pong_tx.send(()).await.is_err() {
                            break;
                        }
                    }
                    Ok(msg) => {
                        warn!(?msg, "Unexpected message type from client");
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse WebSocket message");
                    }
                },
                Message::Binary(_) => {
                    warn!("Received unexpected binary message");
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum answers protocol pings itself
                }
                Message::Close(_) => {
                    info!("Client requested close");
                    break;
                }
            }
        }

        debug!("WebSocket receive task terminated");
    });

    // Wait for either task to complete (connection closed)
    tokio::select! {
        _ = (&mut send_task) => {
            debug!("Send task completed, aborting receive task");
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            debug!("Receive task completed, aborting send task");
            send_task.abort();
        },
    }

    info!("WebSocket connection closed");
}
