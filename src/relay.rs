//! Realtime relay: the WebSocket endpoint that fans chat out to everyone.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ChatMessage;

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub identity: Option<String>,
}

/// WebSocket upgrade handler
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ChatQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: ChatQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let identity = params.identity.unwrap_or_else(|| "anonymous".to_string());
    let connection_id = ulid::Ulid::new().to_string();
    let participant = state.register_participant(&connection_id, &identity).await;
    tracing::info!(%connection_id, %identity, "participant connected");

    // Subscribe before the welcome so nothing broadcast in between is lost.
    let mut relay_rx = state.relay.subscribe();

    let welcome = ServerMessage::Welcome {
        connection_id: participant.connection_id.clone(),
        identity: participant.identity.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            state.unregister_participant(&connection_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            relay_msg = relay_rx.recv() => {
                match relay_msg {
                    Ok(msg) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Best-effort relay: the slow subscriber just lost
                        // those messages, keep forwarding from here.
                        tracing::warn!(%connection_id, missed, "relay subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::SendMessage { sender: from, text }) => {
                                tracing::debug!(%from, "chat message");
                                state.relay.send_chat(ChatMessage {
                                    sender: from,
                                    text: Some(text).filter(|t| !t.is_empty()),
                                    attachment: None,
                                    timestamp: chrono::Utc::now().to_rfc3339(),
                                });
                            }
                            Err(e) => {
                                tracing::error!("failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        // A dropped connection is a normal unregister, not a failure.
                        tracing::info!(%connection_id, "connection lost: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.unregister_participant(&connection_id).await;
    tracing::info!(%connection_id, %identity, "participant disconnected");
}
