//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, UserId},
    infrastructure::dto::websocket::{ClientFrame, ErrorKind, HistoryMessage, ServerFrame},
    ui::state::AppState,
    usecase::{ChatGateway, GatewayError},
};

/// Default number of messages returned for a `history` frame without a limit
const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Query parameters for WebSocket connection
///
/// The user id is asserted by the authenticating proxy in front of the gateway.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> UserId (Domain Model)
    let user_id = match UserId::try_from(query.user_id.clone()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejecting connection with user_id '{}': {}", query.user_id, e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

/// Spawns a task that forwards serialized frames from the rx channel to the WebSocket sink.
///
/// This is the only writer of the socket: pushes from the gateway and replies
/// to this connection's own requests both arrive through the channel.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();

    // Create a channel for this connection to receive frames
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = state.gateway.on_connect(user_id.clone(), tx.clone()).await;

    // Pushes that arrive before this point stay queued in rx, so the
    // connected frame is always the first one the client sees.
    let connected = ServerFrame::Connected {
        connection_id: connection_id.to_string(),
        user_id: user_id.to_string(),
    };
    let delivered = match serde_json::to_string(&connected) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize connected frame: {}", e);
            false
        }
    };
    if !delivered {
        tracing::warn!("Could not greet '{}' on '{}'", user_id, connection_id);
        state.gateway.on_disconnect(&connection_id).await;
        return;
    }

    let gateway = state.gateway.clone();

    // Spawn a task to handle frames from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received frame on '{}': {}", connection_id, text);
                    let reply = handle_client_frame(&gateway, &connection_id, &text).await;
                    match serde_json::to_string(&reply) {
                        Ok(json) => {
                            if tx.send(json).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::error!("Failed to serialize reply: {}", e),
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_id);
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.gateway.on_disconnect(&connection_id).await;
}

/// Handle a single client frame and build the reply for this connection.
async fn handle_client_frame(
    gateway: &ChatGateway,
    connection_id: &ConnectionId,
    text: &str,
) -> ServerFrame {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Malformed frame on '{}': {}", connection_id, e);
            return ServerFrame::Error {
                kind: ErrorKind::BadRequest,
                message: e.to_string(),
            };
        }
    };

    match frame {
        ClientFrame::Send { receiver_id, body } => {
            let receiver = match UserId::try_from(receiver_id) {
                Ok(id) => id,
                Err(e) => return error_frame(&GatewayError::from(e)),
            };
            match gateway.send_message(connection_id, receiver, body).await {
                Ok(message) => ServerFrame::Sent {
                    message_id: message.id.value(),
                    sent_at: message.sent_at.value(),
                },
                Err(e) => error_frame(&e),
            }
        }
        ClientFrame::MarkRead { sender_id } => {
            let sender = match UserId::try_from(sender_id) {
                Ok(id) => id,
                Err(e) => return error_frame(&GatewayError::from(e)),
            };
            match gateway.mark_read(connection_id, sender.clone()).await {
                Ok(count) => ServerFrame::MarkedRead {
                    sender_id: sender.into_string(),
                    count,
                },
                Err(e) => error_frame(&e),
            }
        }
        ClientFrame::History { peer_id, limit } => {
            let peer = match UserId::try_from(peer_id) {
                Ok(id) => id,
                Err(e) => return error_frame(&GatewayError::from(e)),
            };
            let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
            match gateway.history(connection_id, peer.clone(), limit).await {
                Ok(messages) => ServerFrame::History {
                    peer_id: peer.into_string(),
                    messages: messages.iter().map(HistoryMessage::from).collect(),
                },
                Err(e) => error_frame(&e),
            }
        }
        ClientFrame::UnreadCount { sender_id } => {
            let sender = match UserId::try_from(sender_id) {
                Ok(id) => id,
                Err(e) => return error_frame(&GatewayError::from(e)),
            };
            match gateway.unread_count(connection_id, sender.clone()).await {
                Ok(count) => ServerFrame::UnreadCount {
                    sender_id: sender.into_string(),
                    count,
                },
                Err(e) => error_frame(&e),
            }
        }
    }
}

fn error_frame(error: &GatewayError) -> ServerFrame {
    let kind = match error {
        GatewayError::AuthenticationMissing => ErrorKind::AuthenticationMissing,
        GatewayError::InvalidMessage(_) => ErrorKind::InvalidMessage,
        GatewayError::StorageFailure(_) => ErrorKind::StorageFailure,
    };
    ServerFrame::Error {
        kind,
        message: error.to_string(),
    }
}
