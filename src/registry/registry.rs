use super::room::{Participant, Room};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// Result of removing a socket from its room.
#[derive(Debug)]
pub struct Departure {
    pub room_id: String,
    pub departed: Participant,
    /// Participants still in the room after the removal
    pub remaining: Vec<Participant>,
}

/// In-memory directory of rooms and their participants.
///
/// The outer map is only held long enough to look up or create a room
/// entry; all membership mutation happens under the room's own mutex, so
/// concurrent operations on the same room never interleave while separate
/// rooms stay independent.
pub struct SessionRegistry {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
    /// socket_id → room_id, so the disconnect path can clean up without the
    /// client resending its room
    memberships: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashMap::new()),
        }
    }

    /// Admit a participant, creating the room on first join. Idempotent by
    /// user identity: a reconnect replaces the stale entry. Returns the full
    /// participant list after the mutation.
    pub async fn join(&self, room_id: &str, participant: Participant) -> Vec<Participant> {
        let room = {
            let mut rooms = self.rooms.write().await;
            Arc::clone(rooms.entry(room_id.to_string()).or_insert_with(|| {
                info!("creating room {}", room_id);
                Arc::new(Mutex::new(Room::new(
                    room_id.to_string(),
                    participant.user_id.clone(),
                )))
            }))
        };

        {
            let mut memberships = self.memberships.write().await;
            memberships.insert(participant.socket_id.clone(), room_id.to_string());
        }

        let mut room = room.lock().await;
        room.admit(participant);
        room.participants.clone()
    }

    /// Remove the entry matching `socket_id` from a room. Deletes the room
    /// when it becomes empty. An unknown room or socket is a no-op.
    pub async fn leave(&self, room_id: &str, socket_id: &str) -> Vec<Participant> {
        self.remove(room_id, socket_id)
            .await
            .map(|d| d.remaining)
            .unwrap_or_default()
    }

    /// Remove a socket from whichever room it joined, if any.
    pub async fn leave_by_socket(&self, socket_id: &str) -> Option<Departure> {
        let room_id = {
            let memberships = self.memberships.read().await;
            memberships.get(socket_id).cloned()
        }?;
        self.remove(&room_id, socket_id).await
    }

    async fn remove(&self, room_id: &str, socket_id: &str) -> Option<Departure> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms.get(room_id)?;

        let (departed, remaining, now_empty) = {
            let mut room = entry.lock().await;
            let departed = room.evict(socket_id)?;
            (departed, room.participants.clone(), room.is_empty())
        };

        if now_empty {
            rooms.remove(room_id);
            info!("room {} is empty, deleting", room_id);
        }
        drop(rooms);

        let mut memberships = self.memberships.write().await;
        memberships.remove(socket_id);

        Some(Departure {
            room_id: room_id.to_string(),
            departed,
            remaining,
        })
    }

    /// Everyone in the room except the given socket.
    pub async fn list_others(&self, room_id: &str, excluding_socket_id: &str) -> Vec<Participant> {
        self.snapshot(room_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.socket_id != excluding_socket_id)
            .collect()
    }

    /// Current participant list, or `None` for an unknown room.
    pub async fn snapshot(&self, room_id: &str) -> Option<Vec<Participant>> {
        let room = {
            let rooms = self.rooms.read().await;
            Arc::clone(rooms.get(room_id)?)
        };
        let room = room.lock().await;
        Some(room.participants.clone())
    }

    pub async fn contains(&self, room_id: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms.contains_key(room_id)
    }

    /// Which room a socket joined, if any.
    pub async fn room_of(&self, socket_id: &str) -> Option<String> {
        let memberships = self.memberships.read().await;
        memberships.get(socket_id).cloned()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
