use std::time::Duration;

use async_trait::async_trait;
use bruno_media::{merge_video_audio, ArtifactJanitor, MergeOptions, TransientArtifact};
use bruno_models::{ArtifactKind, Stage};
use tracing::info;

use crate::cancel::CancelSignal;
use crate::error::PipelineError;
use crate::stages::{MediaMerger, StageResult};

/// Local ffmpeg mux.
#[derive(Debug, Clone)]
pub struct FfmpegMerger {
    timeout: Duration,
}

impl FfmpegMerger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MediaMerger for FfmpegMerger {
    async fn merge(
        &self,
        video: &TransientArtifact,
        audio: &TransientArtifact,
        janitor: &ArtifactJanitor,
        cancel: &CancelSignal,
    ) -> StageResult<TransientArtifact> {
        let output = janitor.acquire(ArtifactKind::MergedVideo)?;

        let options = MergeOptions {
            timeout: self.timeout,
            cancel: Some(cancel.receiver()),
            ..Default::default()
        };

        match merge_video_audio(video.path(), audio.path(), output.path(), options).await {
            Ok(outcome) => {
                info!(
                    output_len = outcome.plan.output_len,
                    audio_truncated = outcome.plan.audio_truncated,
                    bytes = outcome.size,
                    "merge complete"
                );
                Ok(output)
            }
            Err(e) => {
                janitor.release(&output).await;
                Err(PipelineError::from_media(Stage::Merge, e))
            }
        }
    }
}
