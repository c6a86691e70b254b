//! Recording lifecycle
//!
//! The coordinator runs one state machine per room, synchronizing start
//! and stop across members, waiting out the settle window, and driving the
//! merge pipeline. The recording store is the durable-row boundary; rows
//! are mutated only from here, always keyed by their unique id.

mod coordinator;
mod store;

pub use coordinator::{RecordingCoordinator, RoomRecordingState};
pub use store::{MemoryRecordingStore, Recording, RecordingStatus, RecordingStore};
