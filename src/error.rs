use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Pipeline stage names, used in error reporting and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Per-user re-encode to the canonical container/codec
    Normalize,
    /// Multi-track side-by-side composition
    Compose,
    /// Upload of the final artifact to durable storage
    Publish,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Normalize => write!(f, "normalize"),
            PipelineStage::Compose => write!(f, "compose"),
            PipelineStage::Publish => write!(f, "publish"),
        }
    }
}

/// Domain errors for rooms, uploads, recording control, and the merge pipeline.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("upload session not found")]
    SessionNotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("missing chunks: received {received} of {expected}")]
    MissingChunks { received: u32, expected: u32 },

    #[error("no valid captures to process")]
    NoValidCaptures,

    #[error("unsupported participant count for composition: {0}")]
    UnsupportedParticipantCount(usize),

    #[error("{stage} stage failed: {cause}")]
    PipelineStageFailure { stage: PipelineStage, cause: String },

    #[error("artifact store failure: {0}")]
    ArtifactStoreFailure(String),

    #[error("a recording is already in progress for this room")]
    RecordingInProgress,

    #[error("recording not found: {0}")]
    RecordingNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StudioResult<T> = Result<T, StudioError>;

impl StudioError {
    fn status(&self) -> StatusCode {
        match self {
            StudioError::RoomNotFound(_) | StudioError::RecordingNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            StudioError::SessionNotFound => StatusCode::NOT_FOUND,
            StudioError::Unauthorized(_) => StatusCode::FORBIDDEN,
            StudioError::InvalidRequest(_) | StudioError::MissingChunks { .. } => {
                StatusCode::BAD_REQUEST
            }
            StudioError::RecordingInProgress
            | StudioError::UnsupportedParticipantCount(_) => StatusCode::CONFLICT,
            StudioError::NoValidCaptures
            | StudioError::PipelineStageFailure { .. }
            | StudioError::ArtifactStoreFailure(_)
            | StudioError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let status = self.status();

        // MissingChunks carries enough detail for the client to retry the
        // upload; everything else is a plain message.
        let body = match &self {
            StudioError::MissingChunks { received, expected } => json!({
                "error": self.to_string(),
                "received": received,
                "expected": expected,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
