//! Replace a video's soundtrack with generated audio.
//!
//! Output length always equals the video length. Longer audio is cut at the
//! end of the video; shorter audio is neither looped nor padded, so the tail
//! of the output is silent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Lengths the merge will produce, derived from the two inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    pub video_len: f64,
    pub audio_len: f64,
    /// Length of the merged file
    pub output_len: f64,
    /// Seconds of the output that carry audio
    pub audio_in_output: f64,
    /// Whether the end of the audio is discarded
    pub audio_truncated: bool,
}

impl MergePlan {
    pub fn for_lengths(video_len: f64, audio_len: f64) -> Self {
        let video_len = video_len.max(0.0);
        let audio_len = audio_len.max(0.0);
        Self {
            video_len,
            audio_len,
            output_len: video_len,
            audio_in_output: audio_len.min(video_len),
            audio_truncated: audio_len > video_len,
        }
    }

    /// Seconds of silence at the end of the output.
    pub fn silent_tail(&self) -> f64 {
        self.output_len - self.audio_in_output
    }
}

/// Options for [`merge_video_audio`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub timeout: Duration,
    pub cancel: Option<watch::Receiver<bool>>,
    pub preset: String,
    pub audio_bitrate: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            cancel: None,
            preset: "veryfast".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub output: PathBuf,
    pub plan: MergePlan,
    pub size: u64,
}

/// Build the ffmpeg invocation for a plan.
pub fn build_merge_command(
    video: &Path,
    audio: &Path,
    output: &Path,
    plan: &MergePlan,
    options: &MergeOptions,
) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .add_input(audio)
        .map("0:v:0")
        .map("1:a:0")
        .video_codec("libx264")
        .preset(options.preset.clone())
        .audio_codec("aac")
        .audio_bitrate(options.audio_bitrate.clone())
        .arg("-movflags")
        .arg("+faststart")
        .output_duration(plan.output_len)
}

/// Merge `audio` onto `video`, writing `output`.
pub async fn merge_video_audio(
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: MergeOptions,
) -> MediaResult<MergeOutcome> {
    let video = video.as_ref();
    let audio = audio.as_ref();
    let output = output.as_ref();

    let video_info = probe_media(video).await?;
    if !video_info.has_video {
        return Err(MediaError::invalid_media(format!(
            "{} has no video stream",
            video.display()
        )));
    }

    let audio_info = probe_media(audio).await?;
    if !audio_info.has_audio {
        return Err(MediaError::invalid_media(format!(
            "{} has no audio stream",
            audio.display()
        )));
    }

    let plan = MergePlan::for_lengths(video_info.duration, audio_info.duration);
    info!(
        video_len = plan.video_len,
        audio_len = plan.audio_len,
        truncated = plan.audio_truncated,
        silent_tail = plan.silent_tail(),
        "merging audio onto video"
    );

    let cmd = build_merge_command(video, audio, output, &plan, &options);

    let mut runner = FfmpegRunner::new().with_timeout(options.timeout);
    if let Some(cancel) = options.cancel.clone() {
        runner = runner.with_cancel(cancel);
    }
    runner.run(&cmd).await?;

    let size = tokio::fs::metadata(output)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    if size == 0 {
        return Err(MediaError::ffmpeg_failed(
            "merge produced an empty file",
            None,
            None,
        ));
    }

    Ok(MergeOutcome {
        output: output.to_path_buf(),
        plan,
        size,
    })
}
