use super::state::AppState;
use crate::error::{StudioError, StudioResult};
use crate::identity::Identity;
use crate::recording::{Recording, RecordingStatus};
use crate::signaling::ParticipantSummary;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionRequest {
    pub room_id: String,
    pub user_id: String,
    pub total_size: u64,
    pub total_chunks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkQuery {
    pub session_id: String,
    pub chunk_index: u32,
    /// Echoed by some clients; the session already knows its total
    #[serde(default)]
    #[allow(dead_code)]
    pub total_chunks: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub session_id: String,
    pub room_id: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub file_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteQuery {
    pub room_id: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoResponse {
    pub room_id: String,
    pub participants: Vec<ParticipantSummary>,
}

// ============================================================================
// Identity helpers
// ============================================================================

async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Identity {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    // Request-scoped id: REST calls have no socket, so a guest identity
    // minted here is only used for authorization checks.
    let scope = uuid::Uuid::new_v4().to_string();
    state.identity.resolve(token, None, &scope).await
}

/// Uploads must come from the identity they claim: an authenticated user
/// may only upload as itself, and an anonymous caller may only claim a
/// guest identity.
fn authorize_upload(identity: &Identity, claimed_user_id: &str) -> StudioResult<()> {
    match identity {
        Identity::Authenticated { id, .. } if id == claimed_user_id => Ok(()),
        Identity::Authenticated { .. } => Err(StudioError::Unauthorized(
            "user id does not match token".to_string(),
        )),
        Identity::Guest { .. } if claimed_user_id.starts_with("guest-") => Ok(()),
        Identity::Guest { .. } => Err(StudioError::Unauthorized(
            "anonymous uploads must use a guest identity".to_string(),
        )),
    }
}

// ============================================================================
// Upload handlers
// ============================================================================

/// POST /api/upload/init-session
pub async fn init_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<InitSessionRequest>,
) -> StudioResult<Json<InitSessionResponse>> {
    let identity = resolve_identity(&state, &headers).await;
    authorize_upload(&identity, &req.user_id)?;

    let session_id = state
        .uploads
        .init_session(&req.room_id, &req.user_id, req.total_size, req.total_chunks)
        .await?;

    Ok(Json(InitSessionResponse { session_id }))
}

/// POST /api/upload/chunk?sessionId=&chunkIndex=&totalChunks=
pub async fn upload_chunk(
    State(state): State<AppState>,
    Query(query): Query<ChunkQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> StudioResult<impl IntoResponse> {
    let identity = resolve_identity(&state, &headers).await;
    let session = state.uploads.get_session(&query.session_id).await?;
    authorize_upload(&identity, &session.user_id)?;

    let ack = state
        .uploads
        .put_chunk(&query.session_id, query.chunk_index, &body)
        .await?;

    Ok(Json(ack))
}

/// POST /api/upload/finalize-session
pub async fn finalize_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FinalizeRequest>,
) -> StudioResult<Json<FinalizeResponse>> {
    let identity = resolve_identity(&state, &headers).await;
    authorize_upload(&identity, &req.user_id)?;

    let session = state.uploads.get_session(&req.session_id).await?;
    if session.room_id != req.room_id || session.user_id != req.user_id {
        return Err(StudioError::Unauthorized(
            "session does not belong to this caller".to_string(),
        ));
    }

    let result = state.uploads.finalize(&req.session_id).await?;
    Ok(Json(FinalizeResponse {
        file_size: result.size,
    }))
}

/// POST /api/upload/complete?roomId=&userId= — single-shot alternative to
/// the chunked path.
pub async fn upload_complete(
    State(state): State<AppState>,
    Query(query): Query<CompleteQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> StudioResult<Json<FinalizeResponse>> {
    let identity = resolve_identity(&state, &headers).await;
    authorize_upload(&identity, &query.user_id)?;

    let result = state
        .uploads
        .put_complete(&query.room_id, &query.user_id, &body)
        .await?;
    Ok(Json(FinalizeResponse {
        file_size: result.size,
    }))
}

// ============================================================================
// Room handlers
// ============================================================================

/// POST /api/create-room
pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> StudioResult<Json<CreateRoomResponse>> {
    let identity = resolve_identity(&state, &headers).await;
    let Identity::Authenticated { username, .. } = identity else {
        return Err(StudioError::Unauthorized(
            "signing in is required to create a room".to_string(),
        ));
    };

    let room_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
    info!("room {} created by {}", room_id, username);

    Ok(Json(CreateRoomResponse {
        room_id,
        created_by: username,
        created_at: Utc::now(),
    }))
}

/// GET /api/room/:room_id
pub async fn room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> StudioResult<Json<RoomInfoResponse>> {
    let participants = state
        .registry
        .snapshot(&room_id)
        .await
        .ok_or_else(|| StudioError::RoomNotFound(room_id.clone()))?;

    Ok(Json(RoomInfoResponse {
        room_id,
        participants: participants.iter().map(ParticipantSummary::from).collect(),
    }))
}

// ============================================================================
// Recording handlers
// ============================================================================

/// Swap a completed recording's stored URL for a signed one. Rows that are
/// not completed, or whose URL is not ours to sign, pass through untouched.
async fn with_signed_url(state: &AppState, mut recording: Recording) -> Recording {
    if recording.status != RecordingStatus::Completed {
        return recording;
    }
    let Some(url) = recording.video_url.clone() else {
        return recording;
    };
    let prefix = format!("{}/", state.artifact_base_url.trim_end_matches('/'));
    if let Some(key) = url.strip_prefix(&prefix) {
        if let Ok(signed) = state.artifacts.signed_url(key, state.signed_url_ttl).await {
            recording.video_url = Some(signed);
        }
    }
    recording
}

/// GET /api/recordings/:recording_id
pub async fn get_recording(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> StudioResult<Json<Recording>> {
    let recording = state.recordings.get(&recording_id).await?;
    Ok(Json(with_signed_url(&state, recording).await))
}

/// GET /api/rooms/:room_id/recordings
pub async fn list_room_recordings(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> StudioResult<Json<Vec<Recording>>> {
    let rows = state.recordings.list_for_room(&room_id).await?;
    let mut signed = Vec::with_capacity(rows.len());
    for row in rows {
        signed.push(with_signed_url(&state, row).await);
    }
    Ok(Json(signed))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
