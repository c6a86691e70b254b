use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Server-side record of one in-progress chunked upload.
///
/// Metadata is immutable for the session's lifetime; only the received-index
/// set mutates, behind its own lock, so concurrent chunk writes never
/// contend on anything but that one insert.
#[derive(Debug)]
pub struct UploadSession {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    /// Directory holding this session's chunk files
    pub storage_path: PathBuf,
    pub total_chunks: u32,
    pub total_size: u64,
    pub created_at: DateTime<Utc>,
    received: Mutex<HashSet<u32>>,
}

impl UploadSession {
    pub fn new(
        id: String,
        room_id: String,
        user_id: String,
        storage_path: PathBuf,
        total_chunks: u32,
        total_size: u64,
    ) -> Self {
        Self {
            id,
            room_id,
            user_id,
            storage_path,
            total_chunks,
            total_size,
            created_at: Utc::now(),
            received: Mutex::new(HashSet::new()),
        }
    }

    /// Record a chunk index as received. Duplicate indices collapse; the
    /// count only reflects distinct indices.
    pub async fn mark_received(&self, chunk_index: u32) -> u32 {
        let mut received = self.received.lock().await;
        received.insert(chunk_index);
        received.len() as u32
    }

    pub async fn received_count(&self) -> u32 {
        self.received.lock().await.len() as u32
    }

    /// Distinct received indices, ascending.
    pub async fn received_indices(&self) -> Vec<u32> {
        let received = self.received.lock().await;
        let mut indices: Vec<u32> = received.iter().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Whether every index in `[0, total_chunks)` has been received.
    pub async fn is_complete(&self) -> bool {
        let received = self.received.lock().await;
        received.len() as u32 == self.total_chunks
            && (0..self.total_chunks).all(|i| received.contains(&i))
    }
}

/// Acknowledgement returned for each stored chunk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub chunk_index: u32,
    /// Distinct chunks received so far
    pub received: u32,
    pub total: u32,
}

/// Outcome of a finalized upload: the canonical capture file.
#[derive(Debug, Clone)]
pub struct FinalizeResult {
    pub path: PathBuf,
    pub size: u64,
}
