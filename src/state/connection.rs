use super::room::Departure;
use super::{normalize_code, AppState, SharedRoom};
use crate::error::{GameError, GameResult};
use crate::persistence;
use crate::protocol::{RoomSnapshot, ServerMessage};
use crate::types::*;
use tokio::sync::broadcast;

/// Which room and player a connection stands for
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
}

/// A connection's place in a room after creating or joining it
#[derive(Debug)]
pub struct Seat {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    pub snapshot: RoomSnapshot,
    /// Subscribed under the lock that admitted the player, so no room
    /// event after admission is missed
    pub feed: broadcast::Receiver<ServerMessage>,
}

pub fn new_connection_id() -> ConnectionId {
    ulid::Ulid::new().to_string()
}

/// Name for players who did not pick one
fn default_name() -> String {
    petname::petname(2, "-").unwrap_or_else(|| "Guest".to_string())
}

impl AppState {
    pub async fn membership(&self, conn: &str) -> Option<Membership> {
        self.connections.read().await.get(conn).cloned()
    }

    async fn bind(&self, conn: &str, membership: Membership) {
        self.connections
            .write()
            .await
            .insert(conn.to_string(), membership);
    }

    /// Look up the player a connection plays as in the given room.
    ///
    /// `None` means the event should be dropped: the connection is not in any
    /// room, or the room no longer exists.
    pub async fn resolve_member(
        &self,
        conn: &str,
        code: &str,
    ) -> Option<GameResult<(PlayerId, SharedRoom)>> {
        let membership = self.membership(conn).await?;
        let room = self.get_room(code).await?;
        if membership.room_code != normalize_code(code) {
            return Some(Err(GameError::unauthorized(
                "You are not a member of this room",
            )));
        }
        Some(Ok((membership.player_id, room)))
    }

    /// Create a room and make the connection its host
    pub async fn host_room(
        &self,
        conn: &str,
        settings: RoomSettings,
        account_id: Option<AccountId>,
    ) -> GameResult<Seat> {
        if self.membership(conn).await.is_some() {
            return Err(GameError::invalid_state("Already in a room"));
        }

        let settings = settings.normalized();
        let name = settings.host_username.clone().unwrap_or_else(default_name);
        let host = Player::new(name, account_id);
        let player_id = host.id.clone();

        let (room_code, room, feed) = self.create_room(settings, host).await;
        let snapshot = room.lock().await.snapshot();
        self.bind(
            conn,
            Membership {
                room_code: room_code.clone(),
                player_id: player_id.clone(),
            },
        )
        .await;

        self.broadcast_public_rooms().await;
        Ok(Seat {
            room_code,
            player_id,
            snapshot,
            feed,
        })
    }

    /// Add the connection to an existing room as a new player
    pub async fn join_room(
        &self,
        conn: &str,
        code: &str,
        display_name: Option<String>,
        account_id: Option<AccountId>,
    ) -> GameResult<Seat> {
        if self.membership(conn).await.is_some() {
            return Err(GameError::invalid_state("Already in a room"));
        }
        let room = self
            .get_room(code)
            .await
            .ok_or_else(|| GameError::NotFound("Room".to_string()))?;

        let name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(default_name);
        let player = Player::new(name, account_id);
        let player_id = player.id.clone();

        let (room_code, snapshot, feed) = {
            let mut guard = room.lock().await;
            let feed = guard.subscribe();
            guard.add_player(player)?;
            (guard.code.clone(), guard.snapshot(), feed)
        };
        self.bind(
            conn,
            Membership {
                room_code: room_code.clone(),
                player_id: player_id.clone(),
            },
        )
        .await;

        self.broadcast_public_rooms().await;
        Ok(Seat {
            room_code,
            player_id,
            snapshot,
            feed,
        })
    }

    /// Connection teardown.
    ///
    /// Unfinished games hand the leaver's score to the gateway. If the
    /// room falls apart, every connection in it is released as well.
    pub async fn disconnect(&self, conn: &str) {
        let Some(membership) = self.connections.write().await.remove(conn) else {
            return;
        };
        let Some(room) = self.get_room(&membership.room_code).await else {
            return;
        };

        let departure = room.lock().await.depart(&membership.player_id);
        match departure {
            Some(Departure::Left {
                player,
                records,
                vote_complete,
            }) => {
                tracing::info!(
                    "Connection {} ({}) left room {}",
                    conn,
                    player.username,
                    membership.room_code
                );
                persistence::dispatch(self.gateway.clone(), records);
                if vote_complete {
                    self.settle_ballots(&room).await;
                }
            }
            Some(Departure::Disbanded { records }) => {
                persistence::dispatch(self.gateway.clone(), records);
                self.destroy_room(&membership.room_code).await;
                self.connections
                    .write()
                    .await
                    .retain(|_, m| m.room_code != membership.room_code);
            }
            None => {
                tracing::warn!(
                    "Connection {} was bound to room {} but had no player",
                    conn,
                    membership.room_code
                );
            }
        }

        self.broadcast_public_rooms().await;
    }
}
