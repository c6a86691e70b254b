use crate::error::{StudioError, StudioResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Terminal-or-not status of a recording row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Processing,
    Completed,
    Failed,
}

impl RecordingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordingStatus::Completed | RecordingStatus::Failed)
    }
}

/// One recording produced by a room. A room accumulates many of these over
/// its life, which is why updates are keyed by `id`, never by `room_id`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: String,
    pub room_id: String,
    /// The participant who initiated the stop
    pub user_id: String,
    pub title: String,
    pub status: RecordingStatus,
    pub video_url: Option<String>,
    pub duration_secs: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Recording {
    pub fn new(room_id: &str, user_id: &str, title: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            title,
            status: RecordingStatus::Processing,
            video_url: None,
            duration_secs: None,
            created_at: Utc::now(),
        }
    }
}

/// Durable recording rows, keyed by id and queryable by room and user.
///
/// Status transitions are monotonic: the store rejects any update to a row
/// already `Completed` or `Failed`.
#[async_trait::async_trait]
pub trait RecordingStore: Send + Sync {
    async fn create(&self, recording: Recording) -> StudioResult<()>;
    async fn get(&self, id: &str) -> StudioResult<Recording>;
    async fn list_for_room(&self, room_id: &str) -> StudioResult<Vec<Recording>>;
    async fn list_for_user(&self, user_id: &str) -> StudioResult<Vec<Recording>>;
    async fn update_completed(
        &self,
        id: &str,
        video_url: &str,
        duration_secs: u32,
    ) -> StudioResult<Recording>;
    async fn update_failed(&self, id: &str) -> StudioResult<Recording>;
}

/// In-memory implementation; the durable database sits outside this
/// service's boundary.
pub struct MemoryRecordingStore {
    rows: RwLock<HashMap<String, Recording>>,
}

impl MemoryRecordingStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    async fn update<F>(&self, id: &str, apply: F) -> StudioResult<Recording>
    where
        F: FnOnce(&mut Recording),
    {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(id)
            .ok_or_else(|| StudioError::RecordingNotFound(id.to_string()))?;
        if row.status.is_terminal() {
            return Err(StudioError::InvalidRequest(format!(
                "recording {} already finished",
                id
            )));
        }
        apply(row);
        Ok(row.clone())
    }
}

impl Default for MemoryRecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RecordingStore for MemoryRecordingStore {
    async fn create(&self, recording: Recording) -> StudioResult<()> {
        let mut rows = self.rows.write().await;
        rows.insert(recording.id.clone(), recording);
        Ok(())
    }

    async fn get(&self, id: &str) -> StudioResult<Recording> {
        let rows = self.rows.read().await;
        rows.get(id)
            .cloned()
            .ok_or_else(|| StudioError::RecordingNotFound(id.to_string()))
    }

    async fn list_for_room(&self, room_id: &str) -> StudioResult<Vec<Recording>> {
        let rows = self.rows.read().await;
        let mut found: Vec<Recording> = rows
            .values()
            .filter(|r| r.room_id == room_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_for_user(&self, user_id: &str) -> StudioResult<Vec<Recording>> {
        let rows = self.rows.read().await;
        let mut found: Vec<Recording> = rows
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_completed(
        &self,
        id: &str,
        video_url: &str,
        duration_secs: u32,
    ) -> StudioResult<Recording> {
        self.update(id, |row| {
            row.status = RecordingStatus::Completed;
            row.video_url = Some(video_url.to_string());
            row.duration_secs = Some(duration_secs);
        })
        .await
    }

    async fn update_failed(&self, id: &str) -> StudioResult<Recording> {
        self.update(id, |row| {
            row.status = RecordingStatus::Failed;
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_rows_stay_completed() {
        let store = MemoryRecordingStore::new();
        let recording = Recording::new("room-1", "user-1", "take one".into());
        let id = recording.id.clone();
        store.create(recording).await.unwrap();

        store.update_completed(&id, "http://a/v.mp4", 42).await.unwrap();

        assert!(store.update_failed(&id).await.is_err());
        assert!(store
            .update_completed(&id, "http://a/other.mp4", 1)
            .await
            .is_err());

        let row = store.get(&id).await.unwrap();
        assert_eq!(row.status, RecordingStatus::Completed);
        assert_eq!(row.video_url.as_deref(), Some("http://a/v.mp4"));
        assert_eq!(row.duration_secs, Some(42));
    }

    #[tokio::test]
    async fn failed_rows_stay_failed() {
        let store = MemoryRecordingStore::new();
        let recording = Recording::new("room-1", "user-1", "take two".into());
        let id = recording.id.clone();
        store.create(recording).await.unwrap();

        store.update_failed(&id).await.unwrap();
        assert!(store.update_completed(&id, "http://a/v.mp4", 5).await.is_err());

        let row = store.get(&id).await.unwrap();
        assert_eq!(row.status, RecordingStatus::Failed);
        assert_eq!(row.video_url, None);
    }

    #[tokio::test]
    async fn rooms_accumulate_rows_newest_first() {
        let store = MemoryRecordingStore::new();
        for title in ["first", "second"] {
            store
                .create(Recording::new("room-1", "user-1", title.into()))
                .await
                .unwrap();
        }
        store
            .create(Recording::new("room-2", "user-1", "elsewhere".into()))
            .await
            .unwrap();

        let rows = store.list_for_room("room-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        let mine = store.list_for_user("user-1").await.unwrap();
        assert_eq!(mine.len(), 3);
    }
}
