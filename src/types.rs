use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;
pub type ConnectionId = String;
pub type AccountId = String;
pub type VoteId = String;
pub type Category = String;

/// Category name -> raw answer text, as typed by one player
pub type AnswerSheet = HashMap<Category, String>;

/// Category name -> scored answer, per player, once a round is in review
pub type ScoredSheet = HashMap<Category, ScoredAnswer>;

/// Albanian alphabet without W and X. Digraphs count as one letter.
pub const ALPHABET: &[&str] = &[
    "A", "B", "C", "Ç", "D", "Dh", "E", "Ë", "F", "G", "Gj", "H", "I", "J", "K", "L", "Ll", "M",
    "N", "Nj", "O", "P", "Q", "R", "Rr", "S", "Sh", "T", "Th", "U", "V", "Y", "Z", "Zh",
];

pub const DEFAULT_CATEGORIES: &[&str] =
    &["Shtet", "Qytet", "Kafshë", "Send", "Ushqim & Pije", "Emër"];

/// Display value for answers that scored nothing
pub const INVALID_ANSWER: &str = "-";

/// Points for a valid answer nobody else gave
pub const UNIQUE_POINTS: u32 = 10;
/// Points for a valid answer shared with at least one other player
pub const SHARED_POINTS: u32 = 5;

/// Bumped whenever the room snapshot layout changes
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Lobby,
    Spinning,
    Playing,
    Reviewing,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoomSettings {
    pub is_private: bool,
    /// Seconds per round
    pub time_limit: u32,
    pub players_max: usize,
    pub rounds_max: u32,
    pub mode: String,
    pub categories: Vec<Category>,
    /// Display name of the creator
    pub host_username: Option<String>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            is_private: false,
            time_limit: 30,
            players_max: 15,
            rounds_max: 24,
            mode: "Normal".to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            host_username: None,
        }
    }
}

impl RoomSettings {
    pub const MIN_TIME_LIMIT: u32 = 10;
    pub const MAX_TIME_LIMIT: u32 = 300;
    pub const MIN_PLAYERS: usize = 2;
    pub const MAX_PLAYERS: usize = 15;
    pub const MAX_ROUNDS: u32 = 24;

    /// Clamp numeric limits and clean up the category list.
    ///
    /// Categories are trimmed, blank entries dropped and case-insensitive
    /// duplicates removed (first spelling wins). An empty list falls back
    /// to the defaults.
    pub fn normalized(mut self) -> Self {
        self.time_limit = self
            .time_limit
            .clamp(Self::MIN_TIME_LIMIT, Self::MAX_TIME_LIMIT);
        self.players_max = self.players_max.clamp(Self::MIN_PLAYERS, Self::MAX_PLAYERS);
        let max_rounds = Self::MAX_ROUNDS.min(ALPHABET.len() as u32);
        self.rounds_max = self.rounds_max.clamp(1, max_rounds);

        let mut seen = Vec::<String>::new();
        let mut categories = Vec::new();
        for category in self.categories {
            let trimmed = category.trim();
            if trimmed.is_empty() {
                continue;
            }
            let folded = trimmed.to_lowercase();
            if seen.contains(&folded) {
                continue;
            }
            seen.push(folded);
            categories.push(trimmed.to_string());
        }
        if categories.is_empty() {
            categories = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
        }
        self.categories = categories;

        self.mode = match self.mode.trim() {
            "" => "Normal".to_string(),
            mode => mode.to_string(),
        };
        self.host_username = self
            .host_username
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    /// Durable account identity, if the player is logged in. Never sent to
    /// other clients.
    #[serde(skip)]
    pub account_id: Option<AccountId>,
    pub username: String,
    pub score: i64,
    pub is_host: bool,
}

impl Player {
    pub fn new(username: String, account_id: Option<AccountId>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            account_id,
            username,
            score: 0,
            is_host: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredAnswer {
    /// Submitted text, or `INVALID_ANSWER` when it scored nothing
    pub value: String,
    pub points: u32,
    pub disputed: bool,
}

/// What a dispute is about
#[derive(Debug, Clone, PartialEq)]
pub enum DisputeSubject {
    /// One answer is not a real word for the category
    InvalidWord { target: PlayerId, word: String },
    /// Two answers were copied from one another
    DuplicateOrigin {
        first: PlayerId,
        second: PlayerId,
        first_word: String,
        second_word: String,
    },
}

/// The single live dispute of a room
#[derive(Debug, Clone)]
pub struct ActiveVote {
    pub id: VoteId,
    pub subject: DisputeSubject,
    pub category: Category,
    pub initiator: PlayerId,
    /// One ballot per voter; `true` means "agree"
    pub ballots: HashMap<PlayerId, bool>,
    pub end_time: chrono::DateTime<chrono::Utc>,
}

impl ActiveVote {
    pub fn tally(&self) -> (usize, usize) {
        let yes = self.ballots.values().filter(|agree| **agree).count();
        (yes, self.ballots.len() - yes)
    }
}
