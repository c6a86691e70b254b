use crate::artifact::ArtifactStore;
use crate::identity::IdentityResolver;
use crate::recording::{RecordingCoordinator, RecordingStore};
use crate::registry::SessionRegistry;
use crate::signaling::{RoomBus, SignalingRelay, SocketDirectory};
use crate::upload::ChunkUploadManager;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state for HTTP handlers and socket connections.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub bus: Arc<RoomBus>,
    pub directory: Arc<SocketDirectory>,
    pub relay: Arc<SignalingRelay>,
    pub uploads: Arc<ChunkUploadManager>,
    pub coordinator: Arc<RecordingCoordinator>,
    pub recordings: Arc<dyn RecordingStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub identity: Arc<dyn IdentityResolver>,
    /// Base under which artifact keys become public URLs; used to recover
    /// the key when signing
    pub artifact_base_url: String,
    pub signed_url_ttl: Duration,
}
