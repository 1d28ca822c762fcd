//! WebSocket message dispatch
//!
//! Lobby messages are handled directly. Everything else is addressed to a
//! room: membership is resolved here once, then the message is dispatched to
//! the round or dispute handler modules.

use crate::error::GameResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

use super::{dispute, lobby, round, RoomFeed};

/// Acknowledge an in-room action
pub(super) fn reply(action: &str, result: GameResult<()>) -> Option<ServerMessage> {
    match result {
        Ok(()) => Some(ServerMessage::ack(action)),
        Err(e) => {
            tracing::warn!("Rejected {}: {}", action, e);
            Some(ServerMessage::rejected(action, &e))
        }
    }
}

/// Handle client messages and return optional response.
///
/// Creating or joining a room installs the room's channel into `feed`.
pub async fn handle_message(
    msg: ClientMessage,
    conn_id: &str,
    state: &Arc<AppState>,
    feed: &mut RoomFeed,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom {
            settings,
            account_id,
        } => lobby::handle_create_room(state, conn_id, feed, settings, account_id).await,

        ClientMessage::JoinRoom {
            room_code,
            display_name,
            account_id,
        } => {
            lobby::handle_join_room(state, conn_id, feed, room_code, display_name, account_id)
                .await
        }

        ClientMessage::GetRoom { room_code } => lobby::handle_get_room(state, room_code).await,

        ClientMessage::GetPublicRooms => lobby::handle_get_public_rooms(state).await,

        msg => handle_room_message(msg, conn_id, state).await,
    }
}

async fn handle_room_message(
    msg: ClientMessage,
    conn_id: &str,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let action = msg.action();
    let code = msg.room_code()?.to_string();

    let (player_id, room) = match state.resolve_member(conn_id, &code).await {
        Some(Ok(member)) => member,
        Some(Err(e)) => {
            tracing::warn!("Rejected {} from {}: {}", action, conn_id, e);
            return Some(ServerMessage::rejected(action, &e));
        }
        None => {
            tracing::debug!("Ignoring {} for room {} from {}", action, code, conn_id);
            return None;
        }
    };

    match msg {
        ClientMessage::StartGame { .. } => round::handle_start_game(state, &room, &player_id).await,

        ClientMessage::StopSpinner { .. } => {
            round::handle_stop_spinner(state, &room, &player_id).await
        }

        ClientMessage::SubmitAnswers {
            answers,
            is_time_up,
            ..
        } => round::handle_submit_answers(state, &room, &player_id, answers, is_time_up).await,

        ClientMessage::SyncPartialAnswers { answers, .. } => {
            round::handle_sync_partial(state, &room, &player_id, answers).await
        }

        ClientMessage::TimeUp { .. } => round::handle_time_up(state, &room).await,

        ClientMessage::EndGame { .. } => round::handle_end_game(state, &room, &player_id).await,

        ClientMessage::DisputeWord {
            target_player_id,
            category,
            ..
        } => {
            dispute::handle_dispute_word(state, &room, &player_id, target_player_id, category)
                .await
        }

        ClientMessage::DisputeCopied {
            player1_id,
            player2_id,
            category,
            ..
        } => {
            dispute::handle_dispute_copied(
                state,
                &room,
                &player_id,
                player1_id,
                player2_id,
                category,
            )
            .await
        }

        ClientMessage::CastVote { agree, .. } => {
            dispute::handle_cast_vote(state, &room, &player_id, agree).await
        }

        ClientMessage::SendMessage {
            text, display_name, ..
        } => lobby::handle_send_message(state, &room, &player_id, text, display_name).await,

        // Lobby messages never get here
        ClientMessage::CreateRoom { .. }
        | ClientMessage::JoinRoom { .. }
        | ClientMessage::GetRoom { .. }
        | ClientMessage::GetPublicRooms => None,
    }
}
