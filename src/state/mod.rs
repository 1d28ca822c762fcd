mod connection;
mod game;
mod registry;
pub mod room;
pub mod score;
pub mod vote;

pub use connection::{new_connection_id, Membership, Seat};
pub use registry::{generate_room_code, normalize_code};

use crate::config::ServerConfig;
use crate::persistence::{InMemoryLeaderboard, ScoreGateway};
use crate::protocol::ServerMessage;
use crate::types::*;
use room::Room;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

/// A live room. Every event for the room is applied under this lock.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Shared application state
///
/// The registry and directory locks are only held for lookups; callers clone
/// the room handle out and release them before locking the room itself.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomCode, SharedRoom>>>,
    pub connections: Arc<RwLock<HashMap<ConnectionId, Membership>>>,
    /// Server-wide channel, used for the public room list
    pub broadcast: broadcast::Sender<ServerMessage>,
    pub gateway: Arc<dyn ScoreGateway>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_gateway(ServerConfig::default(), Arc::new(InMemoryLeaderboard::new()))
    }

    pub fn with_gateway(config: ServerConfig, gateway: Arc<dyn ScoreGateway>) -> Self {
        tracing::info!("Using {} score gateway", gateway.name());
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            broadcast: crate::broadcast::channel(),
            gateway,
            config: Arc::new(config),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
