//! Read-only HTTP endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::persistence::{AccountStats, ScoreGateway};
use crate::protocol::PublicRoomSummary;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<AccountStats>,
}

/// Top accounts by cumulative score.
///
/// GET /api/leaderboard
///
/// A gateway failure is logged and served as an empty board.
pub async fn leaderboard(State(state): State<Arc<AppState>>) -> Json<LeaderboardResponse> {
    let leaderboard = match state
        .gateway
        .leaderboard(state.config.leaderboard_limit)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Leaderboard query failed: {}", e);
            vec![]
        }
    };
    Json(LeaderboardResponse { leaderboard })
}

/// GET /api/rooms
pub async fn public_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<PublicRoomSummary>> {
    Json(state.list_public_rooms().await)
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
