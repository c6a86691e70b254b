//! Durable artifact storage boundary
//!
//! The object store itself lives outside this service; only its contract
//! matters here: accept final artifacts, issue time-limited read URLs. The
//! local-disk implementation backs development and tests.

mod local;

use crate::error::StudioResult;
use std::path::Path;
use std::time::Duration;

pub use local::LocalArtifactStore;

/// Durable object storage for finished recordings.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store a local file under `key`, returning its public URL.
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> StudioResult<String>;

    /// Time-limited, access-controlled read URL for a stored artifact.
    async fn signed_url(&self, key: &str, ttl: Duration) -> StudioResult<String>;
}
