//! Dispute and vote message handlers

use super::handlers::reply;
use crate::protocol::ServerMessage;
use crate::state::vote::DisputeRequest;
use crate::state::{AppState, SharedRoom};
use crate::types::*;
use std::sync::Arc;

pub async fn handle_dispute_word(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
    target: PlayerId,
    category: Category,
) -> Option<ServerMessage> {
    tracing::info!("{} disputes {}'s {} answer", player_id, target, category);
    let request = DisputeRequest::InvalidWord { target, category };
    reply("disputeWord", state.dispute(room, player_id, request).await)
}

pub async fn handle_dispute_copied(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
    first: PlayerId,
    second: PlayerId,
    category: Category,
) -> Option<ServerMessage> {
    tracing::info!(
        "{} claims {} and {} copied in {}",
        player_id,
        first,
        second,
        category
    );
    let request = DisputeRequest::Copied {
        first,
        second,
        category,
    };
    reply("disputeCopied", state.dispute(room, player_id, request).await)
}

pub async fn handle_cast_vote(
    state: &Arc<AppState>,
    room: &SharedRoom,
    player_id: &str,
    agree: bool,
) -> Option<ServerMessage> {
    reply("castVote", state.cast_vote(room, player_id, agree).await)
}
