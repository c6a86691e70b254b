//! HTTP surface
//!
//! One axum router carries the REST API and the signaling WebSocket:
//! - GET  /ws - signaling connection upgrade
//! - POST /api/create-room - mint a room code
//! - GET  /api/room/:room_id - live participant snapshot
//! - POST /api/upload/init-session | chunk | finalize-session | complete
//! - GET  /api/recordings/:id - recording row with signed URL
//! - GET  /api/rooms/:room_id/recordings - a room's recordings
//! - GET  /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
