use super::handlers;
use super::state::AppState;
use crate::signaling;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Per-chunk upload cap; the reference client splits captures well below
/// this.
const MAX_CHUNK_BYTES: usize = 10 * 1024 * 1024;
/// Cap for the single-shot upload path, which carries a whole capture.
const MAX_COMPLETE_BYTES: usize = 512 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, artifacts_dir: &Path) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Signaling WebSocket
        .route("/ws", get(signaling::ws_handler))
        // Rooms
        .route("/api/create-room", post(handlers::create_room))
        .route("/api/room/:room_id", get(handlers::room_info))
        // Chunked upload sessions
        .route("/api/upload/init-session", post(handlers::init_session))
        .route(
            "/api/upload/chunk",
            post(handlers::upload_chunk).layer(DefaultBodyLimit::max(MAX_CHUNK_BYTES)),
        )
        .route(
            "/api/upload/finalize-session",
            post(handlers::finalize_session),
        )
        .route(
            "/api/upload/complete",
            post(handlers::upload_complete).layer(DefaultBodyLimit::max(MAX_COMPLETE_BYTES)),
        )
        // Recording queries
        .route(
            "/api/recordings/:recording_id",
            get(handlers::get_recording),
        )
        .route(
            "/api/rooms/:room_id/recordings",
            get(handlers::list_room_recordings),
        )
        // Published artifacts (local store)
        .nest_service("/artifacts", ServeDir::new(artifacts_dir))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
