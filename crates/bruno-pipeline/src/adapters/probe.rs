use std::path::Path;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::stages::{DurationProbe, StageResult};

/// Duration from ffprobe's container metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeDurationProbe;

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration(&self, video: &Path) -> StageResult<f64> {
        bruno_media::get_duration(video)
            .await
            .map_err(|e| PipelineError::validation(format!("Could not read video duration: {}", e)))
    }
}
