//! Chunked capture upload
//!
//! Each participant streams its local capture to the server as indexed
//! chunks inside an upload session, or as one already-complete file. Both
//! paths land the capture at the same canonical per-user location, so the
//! merge stage never cares which path was used.

mod manager;
mod session;

pub use manager::{
    canonical_capture_path, collect_room_captures, ChunkUploadManager,
};
pub use session::{ChunkAck, FinalizeResult, UploadSession};
