pub mod artifact;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod pipeline;
pub mod recording;
pub mod registry;
pub mod signaling;
pub mod upload;

pub use artifact::{ArtifactStore, LocalArtifactStore};
pub use config::Config;
pub use error::{PipelineStage, StudioError, StudioResult};
pub use http::{create_router, AppState};
pub use identity::{Identity, IdentityResolver, TokenTableResolver};
pub use pipeline::{MergeJob, MergeOutcome, MergePipeline, MergeRunner, MergeWorkerPool};
pub use recording::{
    MemoryRecordingStore, Recording, RecordingCoordinator, RecordingStatus, RecordingStore,
    RoomRecordingState,
};
pub use registry::{Participant, Room, SessionRegistry};
pub use signaling::{ClientEvent, RoomBus, ServerEvent, SignalingRelay, SocketDirectory};
pub use upload::{ChunkUploadManager, UploadSession};
