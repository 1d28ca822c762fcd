use crate::error::GameError;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        settings: RoomSettings,
        #[serde(default)]
        account_id: Option<AccountId>,
    },
    JoinRoom {
        room_code: RoomCode,
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        account_id: Option<AccountId>,
    },
    GetRoom {
        room_code: RoomCode,
    },
    GetPublicRooms,
    /// Host starts the game, or the next round while reviewing
    StartGame {
        room_code: RoomCode,
    },
    StopSpinner {
        room_code: RoomCode,
    },
    SubmitAnswers {
        room_code: RoomCode,
        answers: AnswerSheet,
        #[serde(default)]
        is_time_up: bool,
    },
    /// Live preview while typing, never changes the phase
    SyncPartialAnswers {
        room_code: RoomCode,
        answers: AnswerSheet,
    },
    TimeUp {
        room_code: RoomCode,
    },
    DisputeWord {
        room_code: RoomCode,
        target_player_id: PlayerId,
        category: Category,
    },
    DisputeCopied {
        room_code: RoomCode,
        player1_id: PlayerId,
        player2_id: PlayerId,
        category: Category,
    },
    CastVote {
        room_code: RoomCode,
        agree: bool,
    },
    EndGame {
        room_code: RoomCode,
    },
    SendMessage {
        room_code: RoomCode,
        text: String,
        #[serde(default)]
        display_name: Option<String>,
    },
}

impl ClientMessage {
    /// Name used in acknowledgements
    pub fn action(&self) -> &'static str {
        match self {
            ClientMessage::CreateRoom { .. } => "createRoom",
            ClientMessage::JoinRoom { .. } => "joinRoom",
            ClientMessage::GetRoom { .. } => "getRoom",
            ClientMessage::GetPublicRooms => "getPublicRooms",
            ClientMessage::StartGame { .. } => "startGame",
            ClientMessage::StopSpinner { .. } => "stopSpinner",
            ClientMessage::SubmitAnswers { .. } => "submitAnswers",
            ClientMessage::SyncPartialAnswers { .. } => "syncPartialAnswers",
            ClientMessage::TimeUp { .. } => "timeUp",
            ClientMessage::DisputeWord { .. } => "disputeWord",
            ClientMessage::DisputeCopied { .. } => "disputeCopied",
            ClientMessage::CastVote { .. } => "castVote",
            ClientMessage::EndGame { .. } => "endGame",
            ClientMessage::SendMessage { .. } => "sendMessage",
        }
    }

    /// Room an in-game action is addressed to
    pub fn room_code(&self) -> Option<&str> {
        match self {
            ClientMessage::CreateRoom { .. } | ClientMessage::GetPublicRooms => None,
            ClientMessage::JoinRoom { room_code, .. }
            | ClientMessage::GetRoom { room_code }
            | ClientMessage::StartGame { room_code }
            | ClientMessage::StopSpinner { room_code }
            | ClientMessage::SubmitAnswers { room_code, .. }
            | ClientMessage::SyncPartialAnswers { room_code, .. }
            | ClientMessage::TimeUp { room_code }
            | ClientMessage::DisputeWord { room_code, .. }
            | ClientMessage::DisputeCopied { room_code, .. }
            | ClientMessage::CastVote { room_code, .. }
            | ClientMessage::EndGame { room_code }
            | ClientMessage::SendMessage { room_code, .. } => Some(room_code),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Synchronous reply to the originating connection
    Ack {
        action: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_code: Option<RoomCode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<RoomSnapshot>,
    },
    PublicRoomsUpdated {
        rooms: Vec<PublicRoomSummary>,
    },
    PlayerJoined {
        players: Vec<Player>,
    },
    PlayerLeft {
        players: Vec<Player>,
    },
    RoomDisbanded,
    GameStarted {
        state: RoomState,
        round: u32,
        spinner: PlayerId,
    },
    RoundStarted {
        letter: String,
        time_limit: u32,
    },
    /// `id` is `"timeout"` when the clock ended the round
    PlayerFinished {
        id: String,
        username: String,
    },
    RoundEnded {
        room: RoomSnapshot,
    },
    GameFinished {
        room: RoomSnapshot,
    },
    VoteStarted {
        title: String,
        message: String,
        /// Epoch milliseconds
        end_time: i64,
    },
    VoteEnded,
    NewMessage {
        username: String,
        text: String,
        /// Epoch milliseconds
        time: i64,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    /// Bare successful acknowledgement
    pub fn ack(action: &str) -> Self {
        ServerMessage::Ack {
            action: action.to_string(),
            success: true,
            code: None,
            message: None,
            room_code: None,
            player_id: None,
            room: None,
        }
    }

    /// Successful acknowledgement carrying room membership details
    pub fn ack_room(
        action: &str,
        room_code: Option<RoomCode>,
        player_id: Option<PlayerId>,
        room: Option<RoomSnapshot>,
    ) -> Self {
        ServerMessage::Ack {
            action: action.to_string(),
            success: true,
            code: None,
            message: None,
            room_code,
            player_id,
            room,
        }
    }

    pub fn rejected(action: &str, err: &GameError) -> Self {
        ServerMessage::Ack {
            action: action.to_string(),
            success: false,
            code: Some(err.code().to_string()),
            message: Some(err.to_string()),
            room_code: None,
            player_id: None,
            room: None,
        }
    }

    pub fn system_message(text: String) -> Self {
        ServerMessage::NewMessage {
            username: "System".to_string(),
            text,
            time: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Entry in the public room browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicRoomSummary {
    pub id: RoomCode,
    pub host_username: String,
    pub players: usize,
    pub max_players: usize,
    pub mode: String,
}

/// Full room state as seen by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub schema_version: u32,
    pub id: RoomCode,
    pub host: PlayerId,
    pub state: RoomState,
    pub settings: RoomSettings,
    pub players: Vec<Player>,
    pub current_round: u32,
    pub current_letter: Option<String>,
    pub used_letters: Vec<String>,
    pub spinner: Option<PlayerId>,
    /// Scored answers, only present while reviewing or finished
    pub answers: HashMap<PlayerId, ScoredSheet>,
    pub vote_active: bool,
}
