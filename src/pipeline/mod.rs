//! Post-processing pipeline
//!
//! Turns raw per-user captures into one durable artifact in three stages:
//! per-user normalization to a canonical codec profile, side-by-side
//! composition when two captures survive, and publication to the artifact
//! store. All media work happens in external ffmpeg/ffprobe processes on a
//! bounded worker pool, off the signaling and upload paths.

pub mod ffmpeg;
mod merge;
mod worker;

pub use merge::{
    compose_plan, filter_valid_captures, CaptureSource, ComposeMode, MergeJob, MergeOutcome,
    MergePipeline, MergeRunner,
};
pub use worker::MergeWorkerPool;
