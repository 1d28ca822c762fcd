use crate::protocol::ServerMessage;
use crate::state::AppState;
use tokio::sync::broadcast;

/// Buffered messages per channel before slow receivers start lagging
pub const CHANNEL_CAPACITY: usize = 100;

/// Create a fan-out channel for one room (or the whole server)
pub fn channel() -> broadcast::Sender<ServerMessage> {
    let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
    tx
}

/// Send to every subscriber of a channel
pub fn send(tx: &broadcast::Sender<ServerMessage>, msg: ServerMessage) {
    // Ignore send errors (no receivers connected is fine)
    let _ = tx.send(msg);
}

impl AppState {
    /// Broadcast to every connected client, regardless of room
    pub fn broadcast_to_all(&self, msg: ServerMessage) {
        send(&self.broadcast, msg);
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    /// Push the current public room list to everyone
    pub async fn broadcast_public_rooms(&self) {
        let rooms = self.list_public_rooms().await;
        self.broadcast_to_all(ServerMessage::PublicRoomsUpdated { rooms });
    }
}
