//! Room actions that reach beyond the room itself: deadline timers,
//! score persistence and the public room list.

use super::room::{GameOutcome, RoundEndTrigger, RoundStart, SpinResult};
use super::vote::DisputeRequest;
use super::{AppState, SharedRoom};
use crate::error::GameResult;
use crate::persistence;
use crate::protocol::ServerMessage;
use crate::types::*;
use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

use super::room::Room;

/// Longest chat message relayed to a room
pub const MAX_CHAT_CHARS: usize = 500;

impl AppState {
    /// Host starts the game or moves on to the next round
    pub async fn start_game(&self, room: &SharedRoom, by: &str) -> GameResult<()> {
        let result = room.lock().await.start_round(by)?;
        if let RoundStart::GameOver(outcome) = result {
            self.settle_game(outcome);
        }
        self.broadcast_public_rooms().await;
        Ok(())
    }

    /// Spinner reveals the letter; the round clock starts ticking
    pub async fn stop_spinner(&self, room: &SharedRoom, by: &str) -> GameResult<()> {
        let outcome = {
            let mut guard = room.lock().await;
            let spin = guard.stop_spinner(by, &mut rand::rng(), Utc::now())?;
            match spin {
                SpinResult::Letter { time_limit, .. } => {
                    let round = guard.round;
                    let weak = Arc::downgrade(room);
                    let state = self.clone();
                    guard
                        .round_timer
                        .start(Duration::from_secs(u64::from(time_limit)), async move {
                            state.on_round_timeout(weak, round).await;
                        });
                    None
                }
                SpinResult::GameOver(outcome) => Some(outcome),
            }
        };

        if let Some(outcome) = outcome {
            self.settle_game(outcome);
        }
        Ok(())
    }

    async fn on_round_timeout(&self, room: Weak<Mutex<Room>>, round: u32) {
        let Some(room) = room.upgrade() else {
            return;
        };
        let mut guard = room.lock().await;
        if guard.round != round {
            return;
        }
        guard.round_timer.disarm();
        if guard.end_round(RoundEndTrigger::Clock) {
            tracing::info!("Room {} round {} timed out", guard.code, round);
        }
    }

    pub async fn submit_answers(
        &self,
        room: &SharedRoom,
        by: &str,
        answers: AnswerSheet,
        is_time_up: bool,
    ) -> GameResult<()> {
        room.lock().await.submit_answers(by, answers, is_time_up)
    }

    pub async fn sync_partial(
        &self,
        room: &SharedRoom,
        by: &str,
        answers: AnswerSheet,
    ) -> GameResult<()> {
        room.lock().await.sync_partial(by, answers)
    }

    /// A client's clock ran out. Only the first report ends the round.
    pub async fn time_up(&self, room: &SharedRoom) {
        room.lock().await.end_round(RoundEndTrigger::Clock);
    }

    pub async fn end_game(&self, room: &SharedRoom, by: &str) -> GameResult<()> {
        let outcome = room.lock().await.end_game(by)?;
        self.settle_game(outcome);
        self.broadcast_public_rooms().await;
        Ok(())
    }

    /// Open a dispute vote and arm its deadline
    pub async fn dispute(
        &self,
        room: &SharedRoom,
        by: &str,
        request: DisputeRequest,
    ) -> GameResult<()> {
        let mut guard = room.lock().await;
        let vote_id = guard.open_dispute(by, request, Utc::now(), self.config.vote_duration())?;

        // A room of one has nobody left to ask
        if guard.ballots_complete() {
            guard.resolve_vote(Some(vote_id.as_str()));
            return Ok(());
        }

        let weak = Arc::downgrade(room);
        let state = self.clone();
        guard
            .vote_timer
            .start(self.config.vote_duration(), async move {
                state.on_vote_deadline(weak, vote_id).await;
            });
        Ok(())
    }

    async fn on_vote_deadline(&self, room: Weak<Mutex<Room>>, vote_id: VoteId) {
        let Some(room) = room.upgrade() else {
            return;
        };
        let mut guard = room.lock().await;
        if guard.active_vote().map(|vote| vote.id.as_str()) != Some(vote_id.as_str()) {
            return;
        }
        guard.vote_timer.disarm();
        tracing::info!("Room {} vote {} deadline reached", guard.code, vote_id);
        guard.resolve_vote(Some(vote_id.as_str()));
    }

    /// Record a ballot, settling the vote once everyone has voted
    pub async fn cast_vote(&self, room: &SharedRoom, by: &str, agree: bool) -> GameResult<()> {
        let mut guard = room.lock().await;
        if guard.cast_ballot(by, agree)? {
            guard.vote_timer.cancel();
            guard.resolve_vote(None);
        }
        Ok(())
    }

    /// Settle the active vote if the remaining players have all voted
    pub async fn settle_ballots(&self, room: &SharedRoom) {
        let mut guard = room.lock().await;
        if guard.ballots_complete() {
            guard.vote_timer.cancel();
            guard.resolve_vote(None);
        }
    }

    /// Relay a chat line to the room. Blank messages are dropped.
    pub async fn send_message(
        &self,
        room: &SharedRoom,
        by: &str,
        text: &str,
        display_name: Option<String>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let text: String = text.chars().take(MAX_CHAT_CHARS).collect();

        let guard = room.lock().await;
        let username = guard
            .player(by)
            .map(|p| p.username.clone())
            .or(display_name)
            .unwrap_or_else(|| "Guest".to_string());
        guard.broadcast(ServerMessage::NewMessage {
            username,
            text,
            time: Utc::now().timestamp_millis(),
        });
    }

    /// Hand a finished game's records to the gateway
    fn settle_game(&self, outcome: GameOutcome) {
        tracing::info!(
            "Game over, {} winner(s), {} record(s) to persist",
            outcome.winners.len(),
            outcome.records.len()
        );
        persistence::dispatch(self.gateway.clone(), outcome.records);
    }
}
