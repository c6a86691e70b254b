use super::session::{ChunkAck, FinalizeResult, UploadSession};
use crate::error::{StudioError, StudioResult};
use crate::pipeline::CaptureSource;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Canonical location of a participant's assembled capture. Both the
/// chunked and the single-shot upload paths write here.
pub fn canonical_capture_path(uploads_root: &Path, room_id: &str, user_id: &str) -> PathBuf {
    uploads_root
        .join(room_id)
        .join(user_id)
        .join(format!("{user_id}.webm"))
}

fn chunk_path(storage_path: &Path, chunk_index: u32) -> PathBuf {
    storage_path.join(format!("chunk_{chunk_index}.webm"))
}

/// Scan a room's upload directory for candidate captures, one per user
/// subdirectory. Missing or empty files are handed over as-is; the merge
/// pipeline decides whether to skip them.
pub async fn collect_room_captures(
    uploads_root: &Path,
    room_id: &str,
) -> StudioResult<Vec<CaptureSource>> {
    let room_dir = uploads_root.join(room_id);
    let mut captures = Vec::new();

    let mut entries = match tokio::fs::read_dir(&room_dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(captures),
    };
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let user_id = entry.file_name().to_string_lossy().to_string();
        if user_id == "merged" {
            continue;
        }
        captures.push(CaptureSource {
            path: canonical_capture_path(uploads_root, room_id, &user_id),
            user_id,
        });
    }
    // Deterministic ordering regardless of directory iteration order.
    captures.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    Ok(captures)
}

/// Manages per-(room, user) upload sessions: creation, chunk ingestion,
/// and ordered reassembly into one capture file.
///
/// Chunks for one session may arrive concurrently; they write to distinct
/// files keyed by index, so the only shared mutation is the received-set
/// insert inside the session.
pub struct ChunkUploadManager {
    uploads_root: PathBuf,
    sessions: RwLock<HashMap<String, Arc<UploadSession>>>,
}

impl ChunkUploadManager {
    pub fn new(uploads_root: PathBuf) -> Self {
        Self {
            uploads_root,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate an upload session and its storage directory.
    pub async fn init_session(
        &self,
        room_id: &str,
        user_id: &str,
        total_size: u64,
        total_chunks: u32,
    ) -> StudioResult<String> {
        if total_chunks == 0 {
            return Err(StudioError::InvalidRequest(
                "totalChunks must be positive".to_string(),
            ));
        }
        if total_size == 0 {
            return Err(StudioError::InvalidRequest(
                "totalSize must be positive".to_string(),
            ));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let storage_path = self.uploads_root.join(room_id).join(user_id);
        tokio::fs::create_dir_all(&storage_path).await?;

        let session = Arc::new(UploadSession::new(
            session_id.clone(),
            room_id.to_string(),
            user_id.to_string(),
            storage_path,
            total_chunks,
            total_size,
        ));

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), session);
        info!(
            "upload session {} created for {}/{} ({} chunks, {} bytes)",
            session_id, room_id, user_id, total_chunks, total_size
        );

        Ok(session_id)
    }

    /// Store one chunk. Writing the same index twice is idempotent — the
    /// later write wins.
    pub async fn put_chunk(
        &self,
        session_id: &str,
        chunk_index: u32,
        bytes: &[u8],
    ) -> StudioResult<ChunkAck> {
        let session = self.get_session(session_id).await?;

        if chunk_index >= session.total_chunks {
            return Err(StudioError::InvalidRequest(format!(
                "chunk index {} out of range (total {})",
                chunk_index, session.total_chunks
            )));
        }

        tokio::fs::write(chunk_path(&session.storage_path, chunk_index), bytes).await?;
        let received = session.mark_received(chunk_index).await;

        Ok(ChunkAck {
            chunk_index,
            received,
            total: session.total_chunks,
        })
    }

    /// Reassemble a complete session into the canonical capture file.
    ///
    /// The session leaves the live set before reassembly, so a repeat call
    /// sees `SessionNotFound` rather than a second reassembly; if chunks
    /// are missing, the session is restored and the caller can retry after
    /// uploading the rest.
    pub async fn finalize(&self, session_id: &str) -> StudioResult<FinalizeResult> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions
                .remove(session_id)
                .ok_or(StudioError::SessionNotFound)?
        };

        if !session.is_complete().await {
            let received = session.received_count().await;
            let expected = session.total_chunks;
            let mut sessions = self.sessions.write().await;
            sessions.insert(session_id.to_string(), session);
            return Err(StudioError::MissingChunks { received, expected });
        }

        let output_path = canonical_capture_path(
            &self.uploads_root,
            &session.room_id,
            &session.user_id,
        );
        let mut output = tokio::fs::File::create(&output_path).await?;

        for chunk_index in session.received_indices().await {
            let path = chunk_path(&session.storage_path, chunk_index);
            let bytes = tokio::fs::read(&path).await?;
            output.write_all(&bytes).await?;
            tokio::fs::remove_file(&path).await?;
        }
        output.flush().await?;
        drop(output);

        let size = tokio::fs::metadata(&output_path).await?.len();
        info!(
            "upload session {} finalized: {} ({} bytes)",
            session_id,
            output_path.display(),
            size
        );

        Ok(FinalizeResult {
            path: output_path,
            size,
        })
    }

    /// Single-shot path: store an already-complete capture at the canonical
    /// location, bypassing session bookkeeping.
    pub async fn put_complete(
        &self,
        room_id: &str,
        user_id: &str,
        bytes: &[u8],
    ) -> StudioResult<FinalizeResult> {
        if bytes.is_empty() {
            return Err(StudioError::InvalidRequest(
                "empty capture upload".to_string(),
            ));
        }

        let output_path = canonical_capture_path(&self.uploads_root, room_id, user_id);
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&output_path, bytes).await?;

        info!(
            "complete capture stored for {}/{} ({} bytes)",
            room_id,
            user_id,
            bytes.len()
        );

        Ok(FinalizeResult {
            path: output_path,
            size: bytes.len() as u64,
        })
    }

    /// Look up a live session.
    pub async fn get_session(&self, session_id: &str) -> StudioResult<Arc<UploadSession>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or(StudioError::SessionNotFound)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions older than `max_age`, deleting their partial chunk
    /// files. Returns the number of sessions removed.
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let expired: Vec<Arc<UploadSession>> = {
            let mut sessions = self.sessions.write().await;
            let stale_ids: Vec<String> = sessions
                .values()
                .filter(|s| s.created_at < cutoff)
                .map(|s| s.id.clone())
                .collect();
            stale_ids
                .iter()
                .filter_map(|id| sessions.remove(id))
                .collect()
        };

        for session in &expired {
            for chunk_index in session.received_indices().await {
                let path = chunk_path(&session.storage_path, chunk_index);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("failed to remove stale chunk {}: {}", path.display(), e);
                }
            }
            info!(
                "swept expired upload session {} ({}/{})",
                session.id, session.room_id, session.user_id
            );
        }

        expired.len()
    }
}
