use super::events::ServerEvent;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::debug;

const TOPIC_CAPACITY: usize = 256;

/// Publish/subscribe bus with one topic per room.
///
/// Publishing is the only way to address every member of a room; targeted
/// delivery goes through [`SocketDirectory`]. A topic is created on first
/// subscribe and dropped when its room dies.
pub struct RoomBus {
    topics: RwLock<HashMap<String, broadcast::Sender<ServerEvent>>>,
}

impl RoomBus {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a room's events, creating the topic if needed.
    pub async fn subscribe(&self, room_id: &str) -> broadcast::Receiver<ServerEvent> {
        let mut topics = self.topics.write().await;
        topics
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Deliver an event to every subscriber of the room. Returns the number
    /// of receivers reached; a missing topic or an empty room reaches zero.
    pub async fn publish(&self, room_id: &str, event: ServerEvent) -> usize {
        let topics = self.topics.read().await;
        match topics.get(room_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => {
                debug!("publish to unknown room topic {}", room_id);
                0
            }
        }
    }

    /// Drop a room's topic once the room is gone.
    pub async fn remove_topic(&self, room_id: &str) {
        let mut topics = self.topics.write().await;
        topics.remove(room_id);
    }
}

impl Default for RoomBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory of live connections for targeted event delivery.
pub struct SocketDirectory {
    sockets: RwLock<HashMap<String, mpsc::UnboundedSender<ServerEvent>>>,
}

impl SocketDirectory {
    pub fn new() -> Self {
        Self {
            sockets: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, socket_id: String, sender: mpsc::UnboundedSender<ServerEvent>) {
        let mut sockets = self.sockets.write().await;
        sockets.insert(socket_id, sender);
    }

    pub async fn unregister(&self, socket_id: &str) {
        let mut sockets = self.sockets.write().await;
        sockets.remove(socket_id);
    }

    /// Deliver an event to one socket. Returns false when the socket is
    /// unknown or its connection is gone.
    pub async fn send_to(&self, socket_id: &str, event: ServerEvent) -> bool {
        let sockets = self.sockets.read().await;
        match sockets.get(socket_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }
}

impl Default for SocketDirectory {
    fn default() -> Self {
        Self::new()
    }
}
