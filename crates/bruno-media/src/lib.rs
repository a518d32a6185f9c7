//! FFmpeg CLI wrapper and transient artifact management.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A runner with timeout and cancellation
//! - FFprobe media inspection (container-reported duration)
//! - Audio/video merge with the truncate-but-never-pad policy
//! - Scoped cleanup of transient files (`ArtifactJanitor`)

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod janitor;
pub mod merge;
pub mod probe;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, remove_if_exists};
pub use janitor::{ArtifactJanitor, TransientArtifact};
pub use merge::{build_merge_command, merge_video_audio, MergeOptions, MergeOutcome, MergePlan};
pub use probe::{get_duration, parse_probe_output, probe_media, MediaInfo};
