use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool gating merge jobs.
///
/// Transcodes are CPU- and I/O-heavy external processes; the permit count
/// caps how many run at once so a slow merge never starves room joins or
/// chunk uploads.
#[derive(Clone)]
pub struct MergeWorkerPool {
    permits: Arc<Semaphore>,
}

impl MergeWorkerPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Wait for a slot. `None` only if the semaphore is closed, which this
    /// pool never does; callers hold the permit for the job's duration.
    pub async fn checkout(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
