//! WebSocket connection loop.
//!
//! One task per socket: registers the connection, sends the welcome
//! message, then multiplexes outbound pushes (from the fan-out
//! transport) with inbound client frames. Every inbound frame slides
//! the connection's expiry watermark. When the socket closes, the
//! connection is detached from the transport and removed from the
//! registry, which cascades away its subscriptions.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::messages::{ClientMessage, ServerMessage};
use crate::app_state::AppState;
use crate::domain::{CardKey, ConnectionId};

/// Runs the read/write loop for a single WebSocket connection.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: Option<uuid::Uuid>) {
    let record = match state.registry.connect(user_id).await {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(error = %e, "connection registration failed");
            return;
        }
    };
    let conn_id = record.conn_id;
    let mut outbound = state.transport.attach(conn_id).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let welcome = ServerMessage::Welcome {
        connection_id: *conn_id.as_uuid(),
    };
    let welcome_sent = match serde_json::to_string(&welcome) {
        Ok(json) => ws_tx.send(Message::text(json)).await.is_ok(),
        Err(_) => false,
    };

    if welcome_sent {
        loop {
            tokio::select! {
                // Event pushed by the broadcaster (or a direct cache hit).
                pushed = outbound.recv() => {
                    match pushed {
                        Some(json) => {
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                        // Transport detached us (e.g. pruned as gone).
                        None => break,
                    }
                }
                // Frame from the client.
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            touch(&state, conn_id).await;
                            let reply = handle_client_message(&state, conn_id, &text).await;
                            if let Some(json) = reply
                                && ws_tx.send(Message::text(json)).await.is_err()
                            {
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {
                            // Liveness only; axum answers protocol pings itself.
                            touch(&state, conn_id).await;
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    }
                }
            }
        }
    }

    state.transport.detach(conn_id).await;
    if let Err(e) = state.registry.disconnect(conn_id).await {
        tracing::warn!(conn_id = %conn_id, error = %e, "disconnect cleanup failed");
    }
    tracing::debug!(conn_id = %conn_id, "ws connection closed");
}

async fn touch(state: &AppState, conn_id: ConnectionId) {
    if let Err(e) = state.registry.touch(conn_id).await {
        tracing::warn!(conn_id = %conn_id, error = %e, "touch failed");
    }
}

/// Processes one client frame, returning the JSON reply (if any).
async fn handle_client_message(
    state: &AppState,
    conn_id: ConnectionId,
    text: &str,
) -> Option<String> {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(_) => {
            return to_json(&ServerMessage::Error {
                message: "malformed message".to_string(),
            });
        }
    };

    let reply = match msg {
        ClientMessage::Subscribe { key } => match CardKey::parse(&key) {
            Ok(card_key) => match state.registry.subscribe(conn_id, &card_key).await {
                Ok(()) => ServerMessage::Subscribed {
                    key: card_key.to_string(),
                },
                Err(e) => ServerMessage::Error {
                    message: e.to_string(),
                },
            },
            Err(e) => ServerMessage::Error {
                message: e.to_string(),
            },
        },
        ClientMessage::Unsubscribe { key } => match CardKey::parse(&key) {
            Ok(card_key) => match state.registry.unsubscribe(conn_id, &card_key).await {
                Ok(_) => ServerMessage::Unsubscribed {
                    key: card_key.to_string(),
                },
                Err(e) => ServerMessage::Error {
                    message: e.to_string(),
                },
            },
            Err(e) => ServerMessage::Error {
                message: e.to_string(),
            },
        },
        ClientMessage::Ping => ServerMessage::Pong,
    };
    to_json(&reply)
}

fn to_json(msg: &ServerMessage) -> Option<String> {
    serde_json::to_string(msg).ok()
}
