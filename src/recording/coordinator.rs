use super::store::{Recording, RecordingStore};
use crate::error::{StudioError, StudioResult};
use crate::identity::Identity;
use crate::pipeline::{MergeJob, MergeRunner, MergeWorkerPool};
use crate::registry::SessionRegistry;
use crate::signaling::{RoomBus, ServerEvent};
use crate::upload::collect_room_captures;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Per-room recording lifecycle.
///
/// `Ready`/`Failed` are momentary outcomes, not resting states: the room
/// drops back to `Idle` as soon as the terminal row update and broadcast
/// are done, so a new recording can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomRecordingState {
    Idle,
    Recording,
    /// Stop accepted; waiting out the grace window for late uploads
    Settling,
    Processing,
}

/// Synchronizes start/stop across a room's members and drives the merge
/// pipeline. One state machine per room; at most one in-flight processing
/// job per room, enforced structurally by the states.
pub struct RecordingCoordinator {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn RecordingStore>,
    runner: Arc<dyn MergeRunner>,
    bus: Arc<RoomBus>,
    pool: MergeWorkerPool,
    uploads_root: PathBuf,
    /// Lead added to "now" so every client starts capture on the same instant
    start_lead: Duration,
    /// Soft barrier between stop and processing
    settle_grace: Duration,
    states: RwLock<HashMap<String, Arc<Mutex<RoomRecordingState>>>>,
}

impl RecordingCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn RecordingStore>,
        runner: Arc<dyn MergeRunner>,
        bus: Arc<RoomBus>,
        pool: MergeWorkerPool,
        uploads_root: PathBuf,
        start_lead: Duration,
        settle_grace: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            runner,
            bus,
            pool,
            uploads_root,
            start_lead,
            settle_grace,
            states: RwLock::new(HashMap::new()),
        }
    }

    async fn state_handle(&self, room_id: &str) -> Arc<Mutex<RoomRecordingState>> {
        let mut states = self.states.write().await;
        Arc::clone(
            states
                .entry(room_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(RoomRecordingState::Idle))),
        )
    }

    /// Current lifecycle state of a room.
    pub async fn state(&self, room_id: &str) -> RoomRecordingState {
        *self.state_handle(room_id).await.lock().await
    }

    /// Begin a synchronized recording. Returns the shared start instant
    /// broadcast to every member.
    pub async fn start(
        &self,
        room_id: &str,
        issuer: &Identity,
    ) -> StudioResult<DateTime<Utc>> {
        if issuer.is_guest() {
            return Err(StudioError::Unauthorized(
                "guests cannot start recording".to_string(),
            ));
        }

        let handle = self.state_handle(room_id).await;
        {
            let mut state = handle.lock().await;
            if *state != RoomRecordingState::Idle {
                return Err(StudioError::RecordingInProgress);
            }
            *state = RoomRecordingState::Recording;
        }

        let start_time = Utc::now()
            + ChronoDuration::milliseconds(self.start_lead.as_millis() as i64);
        info!(
            "recording starts in room {} at {} (issuer {})",
            room_id,
            start_time,
            issuer.user_id()
        );
        self.bus
            .publish(
                room_id,
                ServerEvent::RecordingStartSync {
                    start_time: start_time.timestamp_millis(),
                },
            )
            .await;

        Ok(start_time)
    }

    /// Stop the active recording: broadcast stop, create the row, then
    /// settle and process in the background. Returns the new recording id.
    pub async fn stop(&self, room_id: &str, issuer: &Identity) -> StudioResult<String> {
        if issuer.is_guest() {
            return Err(StudioError::Unauthorized(
                "guests cannot stop recording".to_string(),
            ));
        }

        let handle = self.state_handle(room_id).await;
        {
            let mut state = handle.lock().await;
            match *state {
                RoomRecordingState::Recording => *state = RoomRecordingState::Settling,
                RoomRecordingState::Idle => {
                    return Err(StudioError::InvalidRequest(
                        "no active recording for this room".to_string(),
                    ))
                }
                // Already winding down; a second stop must not queue a
                // second job.
                _ => return Err(StudioError::RecordingInProgress),
            }
        }

        self.bus.publish(room_id, ServerEvent::RecordingStopSync).await;

        if !self.registry.contains(room_id).await {
            let mut state = handle.lock().await;
            *state = RoomRecordingState::Idle;
            return Err(StudioError::RoomNotFound(room_id.to_string()));
        }

        let title = format!("Recording - {}", Utc::now().format("%Y-%m-%d %H:%M"));
        let recording = Recording::new(room_id, issuer.user_id(), title);
        let recording_id = recording.id.clone();

        if let Err(e) = self.store.create(recording).await {
            error!("failed to create recording row: {}", e);
            self.bus
                .publish(
                    room_id,
                    ServerEvent::VideoError {
                        recording_id: None,
                        error: "failed to create recording entry".to_string(),
                    },
                )
                .await;
            let mut state = handle.lock().await;
            *state = RoomRecordingState::Idle;
            return Err(e);
        }

        info!(
            "recording {} created for room {}, settling for {:?}",
            recording_id, room_id, self.settle_grace
        );
        self.bus
            .publish(
                room_id,
                ServerEvent::RecordingProcessing {
                    recording_id: recording_id.clone(),
                    message: "Processing your recording...".to_string(),
                },
            )
            .await;

        self.spawn_settle_job(room_id.to_string(), recording_id.clone(), handle);
        Ok(recording_id)
    }

    /// Background tail of a stop: wait out the grace window so in-flight
    /// finalize calls can land, then run the pipeline under a pool permit.
    fn spawn_settle_job(
        &self,
        room_id: String,
        recording_id: String,
        handle: Arc<Mutex<RoomRecordingState>>,
    ) {
        let store = Arc::clone(&self.store);
        let runner = Arc::clone(&self.runner);
        let bus = Arc::clone(&self.bus);
        let pool = self.pool.clone();
        let uploads_root = self.uploads_root.clone();
        let grace = self.settle_grace;

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            {
                let mut state = handle.lock().await;
                *state = RoomRecordingState::Processing;
            }

            let result = {
                let _permit = pool.checkout().await;
                match collect_room_captures(&uploads_root, &room_id).await {
                    Ok(captures) => {
                        info!(
                            "processing room {}: {} candidate capture(s)",
                            room_id,
                            captures.len()
                        );
                        runner
                            .process(MergeJob {
                                room_id: room_id.clone(),
                                recording_id: recording_id.clone(),
                                captures,
                            })
                            .await
                    }
                    Err(e) => Err(e),
                }
            };

            match result {
                Ok(outcome) => {
                    match store
                        .update_completed(
                            &recording_id,
                            &outcome.video_url,
                            outcome.duration_secs,
                        )
                        .await
                    {
                        Ok(_) => {
                            info!(
                                "recording {} ready: {}",
                                recording_id, outcome.video_url
                            );
                            bus.publish(
                                &room_id,
                                ServerEvent::VideoReady {
                                    download_url: outcome.video_url,
                                    recording_id: recording_id.clone(),
                                },
                            )
                            .await;
                        }
                        Err(e) => {
                            error!(
                                "recording {} processed but row update failed: {}",
                                recording_id, e
                            );
                            bus.publish(
                                &room_id,
                                ServerEvent::VideoError {
                                    recording_id: Some(recording_id.clone()),
                                    error: "failed to persist recording".to_string(),
                                },
                            )
                            .await;
                        }
                    }
                }
                Err(e) => {
                    warn!("processing failed for room {}: {}", room_id, e);
                    // Best effort: the in-memory state recovers to Idle even
                    // if the row update fails.
                    if let Err(db) = store.update_failed(&recording_id).await {
                        error!(
                            "failed to mark recording {} failed: {}",
                            recording_id, db
                        );
                    }
                    bus.publish(
                        &room_id,
                        ServerEvent::VideoError {
                            recording_id: Some(recording_id.clone()),
                            error: e.to_string(),
                        },
                    )
                    .await;
                }
            }

            let mut state = handle.lock().await;
            *state = RoomRecordingState::Idle;
        });
    }
}
