use chrono::{DateTime, Utc};
use serde::Serialize;

/// One connected member of a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection-scoped id; changes on every reconnect
    pub socket_id: String,
    /// Stable user identity, or the synthetic guest id
    pub user_id: String,
    pub user_name: String,
    pub is_guest: bool,
}

/// A named set of concurrently connected participants sharing one
/// recording session.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    /// Ordered by join time, unique by `user_id`
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Room {
    pub fn new(id: String, created_by: String) -> Self {
        Self {
            id,
            participants: Vec::new(),
            created_at: Utc::now(),
            created_by,
        }
    }

    /// Insert a participant, replacing any stale entry sharing its socket
    /// or user identity. A rejoin under the same identity replaces, never
    /// duplicates, the prior entry.
    pub fn admit(&mut self, participant: Participant) {
        self.participants
            .retain(|p| p.socket_id != participant.socket_id);
        self.participants
            .retain(|p| p.user_id != participant.user_id);
        self.participants.push(participant);
    }

    /// Remove the entry matching `socket_id`, returning it when present.
    pub fn evict(&mut self, socket_id: &str) -> Option<Participant> {
        let idx = self
            .participants
            .iter()
            .position(|p| p.socket_id == socket_id)?;
        Some(self.participants.remove(idx))
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
