//! Lobby message handlers
//!
//! Room creation, joining, lookups and chat.

use crate::protocol::ServerMessage;
use crate::state::{AppState, SharedRoom};
use crate::types::*;
use std::sync::Arc;

use super::RoomFeed;

pub async fn handle_create_room(
    state: &Arc<AppState>,
    conn_id: &str,
    feed: &mut RoomFeed,
    settings: RoomSettings,
    account_id: Option<AccountId>,
) -> Option<ServerMessage> {
    match state.host_room(conn_id, settings, account_id).await {
        Ok(seat) => {
            tracing::info!("Connection {} hosts room {}", conn_id, seat.room_code);
            *feed = Some((seat.room_code.clone(), seat.feed));
            Some(ServerMessage::ack_room(
                "createRoom",
                Some(seat.room_code),
                Some(seat.player_id),
                Some(seat.snapshot),
            ))
        }
        Err(e) => {
            tracing::warn!("Room creation failed for {}: {}", conn_id, e);
            Some(ServerMessage::rejected("createRoom", &e))
        }
    }
}

pub async fn handle_join_room(
    state: &Arc<AppState>,
    conn_id: &str,
    feed: &mut RoomFeed,
    room_code: RoomCode,
    display_name: Option<String>,
    account_id: Option<AccountId>,
) -> Option<ServerMessage> {
    match state
        .join_room(conn_id, &room_code, display_name, account_id)
        .await
    {
        Ok(seat) => {
            *feed = Some((seat.room_code.clone(), seat.feed));
            Some(ServerMessage::ack_room(
                "joinRoom",
                Some(seat.room_code),
                Some(seat.player_id),
                Some(seat.snapshot),
            ))
        }
        Err(e) => {
            tracing::warn!("Join of {} failed for {}: {}", room_code, conn_id, e);
            Some(ServerMessage::rejected("joinRoom", &e))
        }
    }
}

pub async fn handle_get_room(state: &Arc<AppState>, room_code: RoomCode) -> Option<ServerMessage> {
    match state.room_snapshot(&room_code).await {
        Ok(snapshot) => Some(ServerMessage::ack_room(
            "getRoom",
            Some(snapshot.id.clone()),
            None,
            Some(snapshot),
        )),
        Err(e) => Some(ServerMessage::rejected("getRoom", &e)),
    }
}

pub async fn handle_get_public_rooms(state: &Arc<AppState>) -> Option<ServerMessage> {
    let rooms = state.list_public_rooms().await;
    Some(ServerMessage::PublicRoomsUpdated { rooms })
}

/// Chat goes out as a room broadcast, so there is nothing to reply
pub async fn handle_send_message(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
    text: String,
    display_name: Option<String>,
) -> Option<ServerMessage> {
    state
        .send_message(room, player_id, &text, display_name)
        .await;
    None
}
