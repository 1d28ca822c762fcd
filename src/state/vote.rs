//! Dispute votes raised while a round is in review.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use super::room::{Phase, Room};
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::types::*;

/// A dispute as requested by a player
#[derive(Debug, Clone, PartialEq)]
pub enum DisputeRequest {
    InvalidWord {
        target: PlayerId,
        category: Category,
    },
    Copied {
        first: PlayerId,
        second: PlayerId,
        category: Category,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub passed: bool,
    pub yes: usize,
    pub no: usize,
}

impl Room {
    /// Open a vote on one or two answers of the current round.
    ///
    /// The initiator's ballot is recorded as "agree" straight away.
    pub fn open_dispute(
        &mut self,
        by: &str,
        request: DisputeRequest,
        now: DateTime<Utc>,
        window: Duration,
    ) -> GameResult<VoteId> {
        let Phase::Reviewing { sheets, vote } = &self.phase else {
            return Err(GameError::invalid_state("Answers are not under review"));
        };
        if vote.is_some() {
            return Err(GameError::invalid_state("A vote is already in progress"));
        }

        let category = match &request {
            DisputeRequest::InvalidWord { category, .. }
            | DisputeRequest::Copied { category, .. } => category.clone(),
        };
        if !self.settings.categories.contains(&category) {
            return Err(GameError::ValidationFailure(format!(
                "Unknown category: {}",
                category
            )));
        }

        let (subject, title, message) = match &request {
            DisputeRequest::InvalidWord { target, .. } => {
                let (player, answer) = reviewed_answer(self, sheets, target, &category)?;
                if answer.points == 0 || answer.disputed {
                    return Err(GameError::invalid_state(
                        "This answer can no longer be disputed",
                    ));
                }
                let message = format!(
                    "Do you agree that \"{}\" by {} in {} is invalid?",
                    answer.value, player.username, category
                );
                (
                    DisputeSubject::InvalidWord {
                        target: target.clone(),
                        word: answer.value.clone(),
                    },
                    "Dispute: Invalid Word",
                    message,
                )
            }
            DisputeRequest::Copied { first, second, .. } => {
                if first == second {
                    return Err(GameError::ValidationFailure(
                        "Pick two different players".to_string(),
                    ));
                }
                let (p1, a1) = reviewed_answer(self, sheets, first, &category)?;
                let (p2, a2) = reviewed_answer(self, sheets, second, &category)?;
                if a1.disputed || a2.disputed {
                    return Err(GameError::invalid_state(
                        "These answers were already disputed",
                    ));
                }
                let message = format!(
                    "Do you agree that {} (\"{}\") and {} (\"{}\") copied each other in {}?",
                    p1.username, a1.value, p2.username, a2.value, category
                );
                (
                    DisputeSubject::DuplicateOrigin {
                        first: first.clone(),
                        second: second.clone(),
                        first_word: a1.value.clone(),
                        second_word: a2.value.clone(),
                    },
                    "Dispute: Copied Word",
                    message,
                )
            }
        };

        let end_time = now + chrono::Duration::milliseconds(window.as_millis() as i64);
        let id = ulid::Ulid::new().to_string();
        let mut ballots = HashMap::new();
        ballots.insert(by.to_string(), true);

        if let Phase::Reviewing { vote, .. } = &mut self.phase {
            *vote = Some(ActiveVote {
                id: id.clone(),
                subject,
                category,
                initiator: by.to_string(),
                ballots,
                end_time,
            });
        }

        tracing::info!("Room {} vote {} opened by {}: {}", self.code, id, by, message);
        self.broadcast(ServerMessage::VoteStarted {
            title: title.to_string(),
            message,
            end_time: end_time.timestamp_millis(),
        });
        Ok(id)
    }

    pub fn active_vote(&self) -> Option<&ActiveVote> {
        match &self.phase {
            Phase::Reviewing { vote, .. } => vote.as_ref(),
            _ => None,
        }
    }

    /// Record or overwrite a member's ballot. Returns whether every current
    /// member has now voted.
    pub fn cast_ballot(&mut self, by: &str, agree: bool) -> GameResult<bool> {
        if !self.is_member(by) {
            return Err(GameError::unauthorized("Only room members can vote"));
        }
        let player_count = self.players.len();
        let Phase::Reviewing {
            vote: Some(vote), ..
        } = &mut self.phase
        else {
            return Err(GameError::invalid_state("No vote in progress"));
        };
        vote.ballots.insert(by.to_string(), agree);
        Ok(vote.ballots.len() >= player_count)
    }

    pub fn ballots_complete(&self) -> bool {
        self.active_vote()
            .map(|vote| vote.ballots.len() >= self.players.len())
            .unwrap_or(false)
    }

    /// Settle the active vote.
    ///
    /// With `expected` set, only the vote with that id is settled; a deadline
    /// that lost the race to the ballot count finds nothing to do. The vote is
    /// taken out of the room before anything else happens, so each vote
    /// resolves at most once.
    pub fn resolve_vote(&mut self, expected: Option<&str>) -> Option<VoteOutcome> {
        let Phase::Reviewing { sheets, vote } = &mut self.phase else {
            return None;
        };
        if let (Some(expected), Some(active)) = (expected, vote.as_ref()) {
            if active.id != expected {
                return None;
            }
        }
        let vote = vote.take()?;

        let (yes, no) = vote.tally();
        let passed = yes * 2 > self.players.len();

        let mut penalties: Vec<(PlayerId, u32)> = Vec::new();
        let text = match &vote.subject {
            DisputeSubject::InvalidWord { target, word } => {
                if let Some(answer) = mark_disputed(sheets, target, &vote.category) {
                    if passed {
                        penalties.push((target.clone(), answer.points));
                        answer.points = 0;
                    }
                }
                if passed {
                    format!(
                        "Vote PASSED ({} Yes, {} No). \"{}\" was marked invalid.",
                        yes, no, word
                    )
                } else {
                    format!(
                        "Vote FAILED ({} Yes, {} No). \"{}\" remains valid.",
                        yes, no, word
                    )
                }
            }
            DisputeSubject::DuplicateOrigin { first, second, .. } => {
                for id in [first, second] {
                    if let Some(answer) = mark_disputed(sheets, id, &vote.category) {
                        if passed && answer.points == UNIQUE_POINTS {
                            penalties.push((id.clone(), UNIQUE_POINTS - SHARED_POINTS));
                            answer.points = SHARED_POINTS;
                        }
                    }
                }
                if passed {
                    format!("Vote PASSED ({} Yes, {} No). Copied words penalized.", yes, no)
                } else {
                    format!("Vote FAILED ({} Yes, {} No). Copied dispute rejected.", yes, no)
                }
            }
        };

        for (id, points) in penalties {
            if let Some(player) = self.player_mut(&id) {
                player.score -= i64::from(points);
            }
        }

        tracing::info!("Room {} vote {}: {}", self.code, vote.id, text);
        self.broadcast(ServerMessage::system_message(text));
        self.broadcast(ServerMessage::VoteEnded);
        self.broadcast(ServerMessage::RoundEnded {
            room: self.snapshot(),
        });

        Some(VoteOutcome { passed, yes, no })
    }
}

fn reviewed_answer<'a>(
    room: &'a Room,
    sheets: &'a HashMap<PlayerId, ScoredSheet>,
    player: &str,
    category: &str,
) -> GameResult<(&'a Player, &'a ScoredAnswer)> {
    let player_record = room
        .player(player)
        .ok_or_else(|| GameError::NotFound("Player".to_string()))?;
    let answer = sheets
        .get(player)
        .and_then(|sheet| sheet.get(category))
        .ok_or_else(|| GameError::NotFound("Answer".to_string()))?;
    Ok((player_record, answer))
}

/// Flag one answer as disputed so it cannot be challenged again
fn mark_disputed<'a>(
    sheets: &'a mut HashMap<PlayerId, ScoredSheet>,
    player: &str,
    category: &str,
) -> Option<&'a mut ScoredAnswer> {
    let answer = sheets.get_mut(player)?.get_mut(category)?;
    answer.disputed = true;
    Some(answer)
}
