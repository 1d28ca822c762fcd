//! Per-room round state machine.
//!
//! A `Room` is always accessed under its own mutex, so every method here
//! runs as one uninterrupted step. Methods broadcast their own
//! notifications; anything that needs the rest of the server (timers,
//! persistence, the public room list) is returned to the caller.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::score;
use crate::broadcast as fanout;
use crate::error::{GameError, GameResult};
use crate::persistence::ScoreRecord;
use crate::protocol::{PublicRoomSummary, RoomSnapshot, ServerMessage};
use crate::timer::DeadlineTimer;
use crate::types::*;

/// Phase-specific room data
#[derive(Debug)]
pub enum Phase {
    Lobby,
    Spinning,
    Playing {
        started_at: DateTime<Utc>,
        answers: HashMap<PlayerId, AnswerSheet>,
    },
    Reviewing {
        sheets: HashMap<PlayerId, ScoredSheet>,
        vote: Option<ActiveVote>,
    },
    Finished {
        /// Last round's sheets, kept for the final screen
        sheets: HashMap<PlayerId, ScoredSheet>,
        winners: Vec<PlayerId>,
    },
}

impl Phase {
    pub fn state(&self) -> RoomState {
        match self {
            Phase::Lobby => RoomState::Lobby,
            Phase::Spinning => RoomState::Spinning,
            Phase::Playing { .. } => RoomState::Playing,
            Phase::Reviewing { .. } => RoomState::Reviewing,
            Phase::Finished { .. } => RoomState::Finished,
        }
    }
}

/// Outcome of a host's start / next-round request
#[derive(Debug, PartialEq)]
pub enum RoundStart {
    Started { round: u32, spinner: PlayerId },
    GameOver(GameOutcome),
}

/// Outcome of stopping the spinner
#[derive(Debug, PartialEq)]
pub enum SpinResult {
    Letter { letter: String, time_limit: u32 },
    /// Every letter has been used
    GameOver(GameOutcome),
}

/// What ended a round
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEndTrigger {
    Finisher(PlayerId),
    Clock,
}

/// Result of entering the finished phase
#[derive(Debug, PartialEq)]
pub struct GameOutcome {
    pub winners: Vec<PlayerId>,
    pub records: Vec<ScoreRecord>,
}

/// Result of a player leaving
#[derive(Debug, PartialEq)]
pub enum Departure {
    Left {
        player: Player,
        records: Vec<ScoreRecord>,
        /// The departure completed the ballots of the active vote
        vote_complete: bool,
    },
    /// Host or last player left, the room must be destroyed
    Disbanded { records: Vec<ScoreRecord> },
}

pub struct Room {
    pub code: RoomCode,
    pub host: PlayerId,
    pub settings: RoomSettings,
    pub players: Vec<Player>,
    pub round: u32,
    pub used_letters: Vec<String>,
    pub current_letter: Option<String>,
    pub spinner: Option<PlayerId>,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    channel: broadcast::Sender<ServerMessage>,
    pub(crate) round_timer: DeadlineTimer,
    pub(crate) vote_timer: DeadlineTimer,
}

impl Room {
    pub fn new(code: RoomCode, settings: RoomSettings, mut host: Player) -> Self {
        host.is_host = true;
        Self {
            code,
            host: host.id.clone(),
            settings,
            players: vec![host],
            round: 0,
            used_letters: Vec::new(),
            current_letter: None,
            spinner: None,
            phase: Phase::Lobby,
            created_at: Utc::now(),
            channel: fanout::channel(),
            round_timer: DeadlineTimer::new(),
            vote_timer: DeadlineTimer::new(),
        }
    }

    pub fn state(&self) -> RoomState {
        self.phase.state()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host == id
    }

    /// A game has started and not yet finished
    pub fn in_progress(&self) -> bool {
        self.round > 0 && self.state() != RoomState::Finished
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.channel.subscribe()
    }

    pub fn broadcast(&self, msg: ServerMessage) {
        fanout::send(&self.channel, msg);
    }

    pub fn add_player(&mut self, player: Player) -> GameResult<()> {
        if self.players.is_empty() {
            // Disbanded while the caller waited for the lock
            return Err(GameError::NotFound("Room".to_string()));
        }
        if self.players.len() >= self.settings.players_max {
            return Err(GameError::Capacity);
        }
        if self.state() != RoomState::Lobby {
            return Err(GameError::invalid_state("Game already in progress"));
        }
        tracing::info!(
            "Player {} ({}) joined room {}",
            player.username,
            player.id,
            self.code
        );
        self.players.push(player);
        self.broadcast(ServerMessage::PlayerJoined {
            players: self.players.clone(),
        });
        Ok(())
    }

    /// Host starts the first round, or the next one while reviewing.
    ///
    /// Once the configured number of rounds has been played, the request
    /// finishes the game instead.
    pub fn start_round(&mut self, by: &str) -> GameResult<RoundStart> {
        if !self.is_host(by) {
            return Err(GameError::unauthorized("Only the host can start a round"));
        }

        match self.state() {
            RoomState::Lobby => {}
            RoomState::Reviewing => {
                if self.active_vote().is_some() {
                    return Err(GameError::invalid_state("A vote is still in progress"));
                }
                if self.round >= self.settings.rounds_max {
                    return Ok(RoundStart::GameOver(self.finish_game()));
                }
            }
            other => {
                return Err(GameError::InvalidState(format!(
                    "Cannot start a round while {:?}",
                    other
                )));
            }
        }

        if self.players.is_empty() {
            return Err(GameError::invalid_state("Room has no players"));
        }

        self.round += 1;
        let index = ((self.round - 1) as usize) % self.players.len();
        let spinner = self.players[index].id.clone();
        self.spinner = Some(spinner.clone());
        self.current_letter = None;
        self.phase = Phase::Spinning;

        tracing::info!(
            "Room {} round {} started, spinner {}",
            self.code,
            self.round,
            spinner
        );
        self.broadcast(ServerMessage::GameStarted {
            state: RoomState::Spinning,
            round: self.round,
            spinner: spinner.clone(),
        });

        Ok(RoundStart::Started {
            round: self.round,
            spinner,
        })
    }

    /// The spinner reveals the round's letter, drawn uniformly from the
    /// letters not yet used this game
    pub fn stop_spinner<R: Rng + ?Sized>(
        &mut self,
        by: &str,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<SpinResult> {
        if self.state() != RoomState::Spinning {
            return Err(GameError::invalid_state("The wheel is not spinning"));
        }
        if self.spinner.as_deref() != Some(by) {
            return Err(GameError::unauthorized(
                "Only the current spinner can stop the wheel",
            ));
        }

        let available: Vec<&str> = ALPHABET
            .iter()
            .copied()
            .filter(|letter| !self.used_letters.iter().any(|used| used == letter))
            .collect();

        let Some(letter) = available.choose(rng).map(|l| l.to_string()) else {
            tracing::info!("Room {} ran out of letters", self.code);
            return Ok(SpinResult::GameOver(self.finish_game()));
        };

        self.used_letters.push(letter.clone());
        self.current_letter = Some(letter.clone());
        self.phase = Phase::Playing {
            started_at: now,
            answers: self
                .players
                .iter()
                .map(|p| (p.id.clone(), AnswerSheet::new()))
                .collect(),
        };

        tracing::info!(
            "Room {} round {} letter {}",
            self.code,
            self.round,
            letter
        );
        self.broadcast(ServerMessage::RoundStarted {
            letter: letter.clone(),
            time_limit: self.settings.time_limit,
        });

        Ok(SpinResult::Letter {
            letter,
            time_limit: self.settings.time_limit,
        })
    }

    /// Store a player's in-progress answers without changing the phase
    pub fn sync_partial(&mut self, by: &str, partial: AnswerSheet) -> GameResult<()> {
        match &mut self.phase {
            Phase::Playing { answers, .. } => {
                answers.insert(by.to_string(), partial);
                Ok(())
            }
            _ => Err(GameError::invalid_state("Round is not in progress")),
        }
    }

    /// A player hands in their sheet, ending the round for everyone.
    ///
    /// Manual completion requires every category to be filled in. A
    /// time-up submission skips that check, and is a no-op if the round
    /// already ended.
    pub fn submit_answers(
        &mut self,
        by: &str,
        submitted: AnswerSheet,
        is_time_up: bool,
    ) -> GameResult<()> {
        let Phase::Playing { answers, .. } = &mut self.phase else {
            if is_time_up {
                return Ok(());
            }
            return Err(GameError::invalid_state("Round is not in progress"));
        };

        if !is_time_up {
            let missing: Vec<&str> = self
                .settings
                .categories
                .iter()
                .filter(|c| {
                    submitted
                        .get(c.as_str())
                        .map(|v| v.trim().is_empty())
                        .unwrap_or(true)
                })
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(GameError::ValidationFailure(format!(
                    "Missing answers for: {}",
                    missing.join(", ")
                )));
            }
        }

        answers.insert(by.to_string(), submitted);
        let trigger = if is_time_up {
            RoundEndTrigger::Clock
        } else {
            RoundEndTrigger::Finisher(by.to_string())
        };
        self.end_round(trigger);
        Ok(())
    }

    /// Move from playing to reviewing and score the round.
    ///
    /// Only the first call per round has an effect; returns whether this
    /// call performed the transition.
    pub fn end_round(&mut self, trigger: RoundEndTrigger) -> bool {
        if !matches!(self.phase, Phase::Playing { .. }) {
            return false;
        }
        let Phase::Playing { answers, .. } = std::mem::replace(&mut self.phase, Phase::Lobby)
        else {
            return false;
        };
        self.round_timer.cancel();

        let finished = match &trigger {
            RoundEndTrigger::Finisher(id) => ServerMessage::PlayerFinished {
                id: id.clone(),
                username: self
                    .player(id)
                    .map(|p| p.username.clone())
                    .unwrap_or_else(|| "Guest".to_string()),
            },
            RoundEndTrigger::Clock => ServerMessage::PlayerFinished {
                id: "timeout".to_string(),
                username: "timeout".to_string(),
            },
        };
        self.broadcast(finished);

        let letter = self.current_letter.clone().unwrap_or_default();
        let ids: Vec<PlayerId> = self.players.iter().map(|p| p.id.clone()).collect();
        let sheets = score::score_round(&self.settings.categories, &letter, &ids, &answers);
        for player in self.players.iter_mut() {
            if let Some(sheet) = sheets.get(&player.id) {
                player.score += i64::from(score::sheet_total(sheet));
            }
        }
        self.phase = Phase::Reviewing {
            sheets,
            vote: None,
        };

        tracing::info!(
            "Room {} round {} ended ({:?})",
            self.code,
            self.round,
            trigger
        );
        self.broadcast(ServerMessage::RoundEnded {
            room: self.snapshot(),
        });
        true
    }

    /// Host ends the game early
    pub fn end_game(&mut self, by: &str) -> GameResult<GameOutcome> {
        if !self.is_host(by) {
            return Err(GameError::unauthorized("Only the host can end the game"));
        }
        if self.state() == RoomState::Finished {
            return Err(GameError::invalid_state("Game already finished"));
        }
        Ok(self.finish_game())
    }

    /// Enter the finished phase, pick winners and collect score records
    pub fn finish_game(&mut self) -> GameOutcome {
        self.round_timer.cancel();
        self.vote_timer.cancel();

        let sheets = match std::mem::replace(&mut self.phase, Phase::Lobby) {
            Phase::Reviewing { sheets, .. } | Phase::Finished { sheets, .. } => sheets,
            _ => HashMap::new(),
        };
        let winners = score::winners(&self.players);
        let records = self
            .players
            .iter()
            .filter_map(|p| {
                p.account_id.as_ref().map(|account_id| ScoreRecord::RoundOutcome {
                    account_id: account_id.clone(),
                    score_delta: p.score,
                    won: winners.contains(&p.id),
                })
            })
            .collect();
        self.phase = Phase::Finished {
            sheets,
            winners: winners.clone(),
        };

        tracing::info!(
            "Room {} finished after {} rounds, winners {:?}",
            self.code,
            self.round,
            winners
        );
        self.broadcast(ServerMessage::GameFinished {
            room: self.snapshot(),
        });

        GameOutcome { winners, records }
    }

    /// Remove a player, or tear the room down if they were the host or the
    /// last one left. Scores of an unfinished game are handed back as
    /// early-exit records.
    pub fn depart(&mut self, id: &str) -> Option<Departure> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let in_progress = self.in_progress();
        let mut records = Vec::new();

        let early_exit = |p: &Player| {
            p.account_id.as_ref().map(|account_id| ScoreRecord::EarlyExit {
                account_id: account_id.clone(),
                score_delta: p.score,
            })
        };

        if in_progress {
            records.extend(early_exit(&self.players[index]));
        }

        if self.is_host(id) || self.players.len() == 1 {
            if in_progress {
                records.extend(
                    self.players
                        .iter()
                        .filter(|p| p.id != id)
                        .filter_map(early_exit),
                );
            }
            self.round_timer.cancel();
            self.vote_timer.cancel();
            self.players.clear();
            tracing::info!("Room {} disbanded", self.code);
            self.broadcast(ServerMessage::RoomDisbanded);
            return Some(Departure::Disbanded { records });
        }

        let player = self.players.remove(index);
        if self.state() == RoomState::Spinning && self.spinner.as_deref() == Some(id) {
            let next = ((self.round.max(1) - 1) as usize) % self.players.len();
            let spinner = self.players[next].id.clone();
            self.spinner = Some(spinner.clone());
            self.broadcast(ServerMessage::GameStarted {
                state: RoomState::Spinning,
                round: self.round,
                spinner,
            });
        }

        let mut vote_complete = false;
        let player_count = self.players.len();
        match &mut self.phase {
            Phase::Playing { answers, .. } => {
                answers.remove(id);
            }
            Phase::Reviewing {
                vote: Some(vote), ..
            } => {
                vote.ballots.remove(id);
                vote_complete = vote.ballots.len() >= player_count;
            }
            _ => {}
        }

        tracing::info!("Player {} left room {}", player.username, self.code);
        self.broadcast(ServerMessage::PlayerLeft {
            players: self.players.clone(),
        });
        Some(Departure::Left {
            player,
            records,
            vote_complete,
        })
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let (answers, vote_active) = match &self.phase {
            Phase::Reviewing { sheets, vote } => (sheets.clone(), vote.is_some()),
            Phase::Finished { sheets, .. } => (sheets.clone(), false),
            _ => (HashMap::new(), false),
        };
        RoomSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            id: self.code.clone(),
            host: self.host.clone(),
            state: self.state(),
            settings: self.settings.clone(),
            players: self.players.clone(),
            current_round: self.round,
            current_letter: self.current_letter.clone(),
            used_letters: self.used_letters.clone(),
            spinner: self.spinner.clone(),
            answers,
            vote_active,
        }
    }

    pub fn summary(&self) -> PublicRoomSummary {
        PublicRoomSummary {
            id: self.code.clone(),
            host_username: self
                .player(&self.host)
                .map(|p| p.username.clone())
                .unwrap_or_else(|| "Host".to_string()),
            players: self.players.len(),
            max_players: self.settings.players_max,
            mode: self.settings.mode.clone(),
        }
    }
}
