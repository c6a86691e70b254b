use super::ffmpeg;
use crate::artifact::ArtifactStore;
use crate::error::{PipelineStage, StudioError, StudioResult};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One participant's raw capture, as found on disk at stop time.
#[derive(Debug, Clone)]
pub struct CaptureSource {
    pub user_id: String,
    pub path: PathBuf,
}

/// A unit of post-processing work for one recording.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub room_id: String,
    pub recording_id: String,
    pub captures: Vec<CaptureSource>,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub video_url: String,
    pub duration_secs: u32,
}

/// How the surviving captures combine into the final artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeMode {
    /// One valid capture: the normalized file is the artifact
    Single,
    /// Two valid captures: side-by-side composite
    SideBySide,
}

/// Decide the composition mode from the number of valid captures.
pub fn compose_plan(valid: usize) -> StudioResult<ComposeMode> {
    match valid {
        0 => Err(StudioError::NoValidCaptures),
        1 => Ok(ComposeMode::Single),
        2 => Ok(ComposeMode::SideBySide),
        n => Err(StudioError::UnsupportedParticipantCount(n)),
    }
}

/// Keep only captures whose file exists and is non-empty. A participant
/// that never uploaded, or uploaded nothing, is skipped rather than
/// failing the whole job.
pub async fn filter_valid_captures(captures: Vec<CaptureSource>) -> Vec<CaptureSource> {
    let mut valid = Vec::with_capacity(captures.len());
    for capture in captures {
        match tokio::fs::metadata(&capture.path).await {
            Ok(meta) if meta.len() > 0 => valid.push(capture),
            Ok(_) => warn!("capture for {} is empty, skipping", capture.user_id),
            Err(_) => warn!("no capture file for {}, skipping", capture.user_id),
        }
    }
    valid
}

/// Executes a [`MergeJob`]; abstracted so the coordinator can be driven
/// with a stub in tests.
#[async_trait::async_trait]
pub trait MergeRunner: Send + Sync {
    async fn process(&self, job: MergeJob) -> StudioResult<MergeOutcome>;
}

/// The ffmpeg-backed pipeline: normalize each capture, compose, publish.
///
/// Working files live under `<room>/merged/` and are removed after a
/// successful publish; on failure they are left in place for diagnosis.
pub struct MergePipeline {
    uploads_root: PathBuf,
    artifacts: Arc<dyn ArtifactStore>,
}

impl MergePipeline {
    pub fn new(uploads_root: PathBuf, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            uploads_root,
            artifacts,
        }
    }

    fn merged_dir(&self, room_id: &str) -> PathBuf {
        self.uploads_root.join(room_id).join("merged")
    }

    /// Stage A: re-encode one capture to the canonical profile.
    async fn normalize(&self, capture: &CaptureSource, merged_dir: &Path) -> StudioResult<PathBuf> {
        let output = merged_dir.join(format!("{}.mp4", capture.user_id));
        info!(
            "normalizing capture for {}: {}",
            capture.user_id,
            capture.path.display()
        );
        ffmpeg::run_ffmpeg(
            &ffmpeg::normalize_args(&capture.path, &output),
            PipelineStage::Normalize,
        )
        .await?;
        Ok(output)
    }

    /// Stage B: combine the normalized tracks into the final working file.
    async fn compose(&self, normalized: &[PathBuf], merged_dir: &Path) -> StudioResult<PathBuf> {
        match compose_plan(normalized.len())? {
            ComposeMode::Single => Ok(normalized[0].clone()),
            ComposeMode::SideBySide => {
                let a = &normalized[0];
                let b = &normalized[1];
                let duration_a = ffmpeg::probe_duration(a, PipelineStage::Compose).await?;
                let duration_b = ffmpeg::probe_duration(b, PipelineStage::Compose).await?;
                let target = duration_a.max(duration_b);
                info!(
                    "composing side-by-side: {:.2}s / {:.2}s, using {:.2}s",
                    duration_a, duration_b, target
                );

                let output = merged_dir.join("final.mp4");
                ffmpeg::run_ffmpeg(
                    &ffmpeg::compose_args(a, b, &output, target),
                    PipelineStage::Compose,
                )
                .await?;
                Ok(output)
            }
        }
    }

    /// Stage C: push the artifact to durable storage.
    async fn publish(&self, room_id: &str, final_path: &Path) -> StudioResult<String> {
        let key = format!(
            "recordings/{}/final-{}.mp4",
            room_id,
            Utc::now().timestamp_millis()
        );
        info!("publishing artifact under key {}", key);
        self.artifacts
            .upload(final_path, &key, "video/mp4")
            .await
    }
}

#[async_trait::async_trait]
impl MergeRunner for MergePipeline {
    async fn process(&self, job: MergeJob) -> StudioResult<MergeOutcome> {
        info!(
            "merge pipeline started for room {} (recording {})",
            job.room_id, job.recording_id
        );

        let merged_dir = self.merged_dir(&job.room_id);
        tokio::fs::create_dir_all(&merged_dir).await?;

        let valid = filter_valid_captures(job.captures).await;
        if valid.is_empty() {
            return Err(StudioError::NoValidCaptures);
        }
        // Reject early: normalizing three tracks just to fail in compose
        // wastes minutes of encoder time.
        compose_plan(valid.len())?;

        let mut normalized = Vec::with_capacity(valid.len());
        for capture in &valid {
            normalized.push(self.normalize(capture, &merged_dir).await?);
        }

        let final_path = self.compose(&normalized, &merged_dir).await?;
        let duration = ffmpeg::probe_duration(&final_path, PipelineStage::Compose).await?;

        let video_url = self.publish(&job.room_id, &final_path).await?;

        // Working files only go away on the success path.
        if let Err(e) = tokio::fs::remove_dir_all(&merged_dir).await {
            warn!(
                "failed to clean working files in {}: {}",
                merged_dir.display(),
                e
            );
        }

        info!(
            "merge pipeline finished for room {}: {} ({:.2}s)",
            job.room_id, video_url, duration
        );

        Ok(MergeOutcome {
            video_url,
            duration_secs: duration.round() as u32,
        })
    }
}
