//! Round message handlers

use super::handlers::reply;
use crate::protocol::ServerMessage;
use crate::state::{AppState, SharedRoom};
use crate::types::AnswerSheet;
use std::sync::Arc;

pub async fn handle_start_game(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
) -> Option<ServerMessage> {
    reply("startGame", state.start_game(room, player_id).await)
}

pub async fn handle_stop_spinner(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
) -> Option<ServerMessage> {
    reply("stopSpinner", state.stop_spinner(room, player_id).await)
}

pub async fn handle_submit_answers(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
    answers: AnswerSheet,
    is_time_up: bool,
) -> Option<ServerMessage> {
    reply(
        "submitAnswers",
        state
            .submit_answers(room, player_id, answers, is_time_up)
            .await,
    )
}

/// Live preview while typing. Sent on every keystroke, so never acknowledged.
pub async fn handle_sync_partial(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
    answers: AnswerSheet,
) -> Option<ServerMessage> {
    if let Err(e) = state.sync_partial(room, player_id, answers).await {
        tracing::debug!("Dropped partial answers from {}: {}", player_id, e);
    }
    None
}

pub async fn handle_time_up(state: &Arc<AppState>, room: &SharedRoom) -> Option<ServerMessage> {
    state.time_up(room).await;
    None
}

pub async fn handle_end_game(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
) -> Option<ServerMessage> {
    reply("endGame", state.end_game(room, player_id).await)
}
