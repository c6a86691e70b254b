// Tests for merge pipeline planning and ffmpeg command construction
//
// The encoder itself is not exercised here; these tests pin down the
// decisions the pipeline makes before it ever spawns a process.

use anyhow::Result;
use duet_studio::pipeline::ffmpeg::{compose_args, normalize_args};
use duet_studio::pipeline::{compose_plan, filter_valid_captures, CaptureSource, ComposeMode};
use duet_studio::StudioError;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn compose_plan_by_participant_count() {
    assert!(matches!(compose_plan(0), Err(StudioError::NoValidCaptures)));
    assert!(matches!(compose_plan(1), Ok(ComposeMode::Single)));
    assert!(matches!(compose_plan(2), Ok(ComposeMode::SideBySide)));
    assert!(matches!(
        compose_plan(3),
        Err(StudioError::UnsupportedParticipantCount(3))
    ));
    assert!(matches!(
        compose_plan(4),
        Err(StudioError::UnsupportedParticipantCount(4))
    ));
}

#[tokio::test]
async fn absent_and_empty_captures_are_skipped_not_fatal() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let present = temp_dir.path().join("present.webm");
    std::fs::write(&present, b"not really media, but non-empty")?;
    let empty = temp_dir.path().join("empty.webm");
    std::fs::write(&empty, b"")?;

    let captures = vec![
        CaptureSource {
            user_id: "u-present".to_string(),
            path: present,
        },
        CaptureSource {
            user_id: "u-empty".to_string(),
            path: empty,
        },
        CaptureSource {
            user_id: "u-missing".to_string(),
            path: temp_dir.path().join("never-uploaded.webm"),
        },
    ];

    let valid = filter_valid_captures(captures).await;
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].user_id, "u-present");

    Ok(())
}

#[test]
fn normalize_targets_the_canonical_profile() {
    let args = normalize_args(Path::new("in.webm"), Path::new("out.mp4"));

    let expect_pair = |flag: &str, value: &str| {
        let at = args
            .iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("missing {flag}"));
        assert_eq!(args[at + 1], value, "unexpected value for {flag}");
    };

    expect_pair("-c:v", "libx264");
    expect_pair("-preset", "faster");
    expect_pair("-crf", "20");
    expect_pair("-pix_fmt", "yuv420p");
    expect_pair("-r", "30");
    expect_pair("-c:a", "aac");
    expect_pair("-ar", "48000");
    expect_pair("-ac", "2");
    assert!(args.contains(&"+faststart".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
}

#[test]
fn composite_duration_is_the_longer_source() {
    // 12.0s and 9.4s sources: the encoder is told to stop at 12.0s, so the
    // shorter stream pads out rather than truncating the longer one.
    let duration = 12.0f64.max(9.4);
    let args = compose_args(Path::new("a.mp4"), Path::new("b.mp4"), Path::new("f.mp4"), duration);

    let at = args.iter().position(|a| a == "-t").expect("missing -t");
    assert_eq!(args[at + 1], "12.000");
}

#[test]
fn composite_filter_stacks_and_mixes_both_tracks() {
    let args = compose_args(Path::new("a.mp4"), Path::new("b.mp4"), Path::new("f.mp4"), 10.0);

    let at = args
        .iter()
        .position(|a| a == "-filter_complex")
        .expect("missing filter graph");
    let graph = &args[at + 1];

    // Equal tiles, horizontal stack, stereo mix of both audio tracks.
    assert!(graph.contains("scale=960:540"));
    assert!(graph.contains("force_original_aspect_ratio=decrease"));
    assert!(graph.contains("hstack=inputs=2"));
    assert!(graph.contains("amerge=inputs=2"));
    assert!(graph.contains("pan=stereo"));

    // Both inputs are mapped in order.
    let inputs: Vec<usize> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| *a == "-i")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(inputs.len(), 2);
    assert_eq!(args[inputs[0] + 1], "a.mp4");
    assert_eq!(args[inputs[1] + 1], "b.mp4");
}
