pub mod dispute;
pub mod handlers;
pub mod lobby;
pub mod round;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{new_connection_id, AppState};
use crate::types::RoomCode;

/// Room channel a connection is currently listening to
pub type RoomFeed = Option<(RoomCode, broadcast::Receiver<ServerMessage>)>;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize {:?}: {}", msg, e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = new_connection_id();
    let (mut sender, mut receiver) = socket.split();
    tracing::info!("WebSocket connected: {}", conn_id);

    // Server-wide notifications (public room list)
    let mut lobby_rx = state.subscribe_all();
    let mut room_feed: RoomFeed = None;

    loop {
        tokio::select! {
            lobby_msg = lobby_rx.recv() => {
                match lobby_msg {
                    Ok(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Connection {} lagged {} lobby messages", conn_id, n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            room_msg = async {
                match &mut room_feed {
                    Some((_, rx)) => rx.recv().await,
                    // Not in a room: wait forever
                    None => std::future::pending().await,
                }
            } => {
                match room_msg {
                    Ok(msg) => {
                        let disbanded = matches!(msg, ServerMessage::RoomDisbanded);
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                        if disbanded {
                            room_feed = None;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Connection {} lagged {} room messages", conn_id, n);
                    }
                    Err(RecvError::Closed) => room_feed = None,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from {}: {}", conn_id, text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let response = handlers::handle_message(
                                    client_msg,
                                    &conn_id,
                                    &state,
                                    &mut room_feed,
                                )
                                .await;
                                if let Some(response) = response {
                                    if !send_json(&mut sender, &response).await {
                                        tracing::error!("Failed to send response to {}", conn_id);
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send_json(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket {} closed", conn_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error on {}: {}", conn_id, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(&conn_id).await;
    tracing::info!("WebSocket connection closed: {}", conn_id);
}
