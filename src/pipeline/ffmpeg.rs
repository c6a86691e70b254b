//! ffmpeg/ffprobe process invocation
//!
//! Argument construction is kept in pure functions so the command shapes
//! are testable without running the tools.

use crate::error::{PipelineStage, StudioError, StudioResult};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Composite canvas: each stream is letterboxed to these dimensions before
/// horizontal stacking.
const TILE_WIDTH: u32 = 960;
const TILE_HEIGHT: u32 = 540;

/// Arguments for the per-user normalization pass: canonical H.264/AAC MP4
/// suitable for downstream composition.
pub fn normalize_args(input: &Path, output: &Path) -> Vec<String> {
    let input = input.to_string_lossy();
    let output = output.to_string_lossy();
    [
        "-y",
        "-i",
        input.as_ref(),
        "-c:v",
        "libx264",
        "-preset",
        "faster",
        "-crf",
        "20",
        "-profile:v",
        "high",
        "-level",
        "4.2",
        "-pix_fmt",
        "yuv420p",
        "-r",
        "30",
        "-c:a",
        "aac",
        "-ar",
        "48000",
        "-ac",
        "2",
        "-b:a",
        "192k",
        "-movflags",
        "+faststart",
        "-threads",
        "0",
        output.as_ref(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Arguments for the two-track side-by-side composite: both streams scaled
/// and letterboxed to equal tiles, stacked horizontally, audio mixed to
/// stereo, output pinned to `duration` seconds so the longer source decides
/// the length.
pub fn compose_args(a: &Path, b: &Path, output: &Path, duration: f64) -> Vec<String> {
    let tile = format!(
        "scale={w}:{h}:flags=lanczos:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setpts=PTS-STARTPTS",
        w = TILE_WIDTH,
        h = TILE_HEIGHT
    );
    let filter = format!(
        "[0:v]{tile}[v0];[1:v]{tile}[v1];[v0][v1]hstack=inputs=2[outv];\
         [0:a]aformat=channel_layouts=stereo[a0];\
         [1:a]aformat=channel_layouts=stereo[a1];\
         [a0][a1]amerge=inputs=2,pan=stereo|c0=0.5*c0+0.5*c2|c1=0.5*c1+0.5*c3[outa]"
    );

    let a = a.to_string_lossy();
    let b = b.to_string_lossy();
    let output = output.to_string_lossy();
    let stop_at = format!("{duration:.3}");
    [
        "-y",
        "-i",
        a.as_ref(),
        "-i",
        b.as_ref(),
        "-filter_complex",
        filter.as_str(),
        "-map",
        "[outv]",
        "-map",
        "[outa]",
        "-t",
        stop_at.as_str(),
        "-r",
        "30",
        "-c:v",
        "libx264",
        "-preset",
        "medium",
        "-crf",
        "18",
        "-c:a",
        "aac",
        "-ar",
        "48000",
        "-b:a",
        "256k",
        "-movflags",
        "+faststart",
        output.as_ref(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Run ffmpeg to completion, attributing any failure to the given stage.
pub async fn run_ffmpeg(args: &[String], stage: PipelineStage) -> StudioResult<()> {
    debug!("ffmpeg {}", args.join(" "));

    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| StudioError::PipelineStageFailure {
            stage,
            cause: format!("failed to spawn ffmpeg: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("ffmpeg failed in {} stage: {}", stage, stderr);
        return Err(StudioError::PipelineStageFailure {
            stage,
            cause: tail(&stderr, 512),
        });
    }
    Ok(())
}

/// Media duration in seconds via ffprobe.
pub async fn probe_duration(path: &Path, stage: PipelineStage) -> StudioResult<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| StudioError::PipelineStageFailure {
            stage,
            cause: format!("failed to spawn ffprobe: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StudioError::PipelineStageFailure {
            stage,
            cause: format!("ffprobe failed: {}", tail(&stderr, 256)),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .trim()
        .parse::<f64>()
        .map_err(|_| StudioError::PipelineStageFailure {
            stage,
            cause: format!("unparseable ffprobe duration: {}", stdout.trim()),
        })
}

fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= max {
        trimmed.to_string()
    } else {
        let start = trimmed.len() - max;
        // Avoid slicing inside a UTF-8 sequence.
        let start = (start..trimmed.len())
            .find(|i| trimmed.is_char_boundary(*i))
            .unwrap_or(0);
        trimmed[start..].to_string()
    }
}
