use super::room::Room;
use super::{AppState, SharedRoom};
use crate::error::{GameError, GameResult};
use crate::protocol::{PublicRoomSummary, RoomSnapshot, ServerMessage};
use crate::types::*;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Generate a random room code (6 characters)
pub fn generate_room_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Room codes are typed by hand, so lookups ignore case and padding
pub fn normalize_code(code: &str) -> RoomCode {
    code.trim().to_uppercase()
}

impl AppState {
    /// Register a new room with `creator` as its host.
    ///
    /// The returned receiver is subscribed before the room becomes reachable.
    pub async fn create_room(
        &self,
        settings: RoomSettings,
        creator: Player,
    ) -> (RoomCode, SharedRoom, broadcast::Receiver<ServerMessage>) {
        let mut rooms = self.rooms.write().await;
        // Collisions are retried while holding the write lock
        let code = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let room = Room::new(code.clone(), settings, creator);
        let feed = room.subscribe();
        let room = Arc::new(Mutex::new(room));
        rooms.insert(code.clone(), room.clone());
        tracing::info!("Created room {} ({} live)", code, rooms.len());
        (code, room, feed)
    }

    pub async fn get_room(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(&normalize_code(code)).cloned()
    }

    pub async fn room_snapshot(&self, code: &str) -> GameResult<RoomSnapshot> {
        let room = self
            .get_room(code)
            .await
            .ok_or_else(|| GameError::NotFound("Room".to_string()))?;
        let snapshot = room.lock().await.snapshot();
        Ok(snapshot)
    }

    /// Rooms still in the lobby and open to anyone
    pub async fn list_public_rooms(&self) -> Vec<PublicRoomSummary> {
        let handles: Vec<SharedRoom> = self.rooms.read().await.values().cloned().collect();

        let mut rooms = Vec::new();
        for handle in handles {
            let room = handle.lock().await;
            if room.state() == RoomState::Lobby && !room.settings.is_private {
                rooms.push((room.created_at, room.summary()));
            }
        }
        rooms.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        rooms.into_iter().map(|(_, summary)| summary).collect()
    }

    pub async fn destroy_room(&self, code: &str) -> Option<SharedRoom> {
        let removed = self.rooms.write().await.remove(&normalize_code(code));
        if removed.is_some() {
            tracing::info!("Destroyed room {}", code);
        }
        removed
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
