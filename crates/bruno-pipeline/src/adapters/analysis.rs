use std::sync::Arc;

use async_trait::async_trait;
use bruno_media::TransientArtifact;
use bruno_ml_client::{
    render_context, AnnotationResult, MlClientResult, VideoIntelligenceClient,
    MINIMAL_ANALYSIS_FALLBACK,
};
use bruno_models::{RemoteJobHandle, RemoteStatusReport, Stage};
use tracing::{info, warn};

use crate::cancel::CancelSignal;
use crate::config::PollerConfig;
use crate::error::PipelineError;
use crate::poller::{Poller, RemoteJobService};
use crate::stages::{StageResult, VideoAnalyzer};

/// Analysis through Google Video Intelligence.
///
/// The annotate call is a long-running operation and goes through the same
/// poller as audio generation.
pub struct VideoIntelligenceAnalyzer {
    client: Arc<VideoIntelligenceClient>,
    poll: PollerConfig,
}

impl VideoIntelligenceAnalyzer {
    pub fn new(client: Arc<VideoIntelligenceClient>, poll: PollerConfig) -> Self {
        Self { client, poll }
    }
}

#[async_trait]
impl RemoteJobService for VideoIntelligenceAnalyzer {
    type Request = Vec<u8>;

    fn name(&self) -> &'static str {
        "video-intelligence"
    }

    async fn submit(&self, video: &Vec<u8>) -> MlClientResult<RemoteJobHandle> {
        let name = self.client.annotate(video).await?;
        Ok(RemoteJobHandle::submitted(name))
    }

    async fn fetch_status(&self, handle: &RemoteJobHandle) -> MlClientResult<RemoteStatusReport> {
        Ok(self.client.get_operation(&handle.id).await?.status_report())
    }

    async fn cancel(&self, handle: &RemoteJobHandle) -> MlClientResult<()> {
        self.client.cancel_operation(&handle.id).await
    }
}

#[async_trait]
impl VideoAnalyzer for VideoIntelligenceAnalyzer {
    async fn analyze(&self, video: &TransientArtifact, cancel: &CancelSignal) -> StageResult<String> {
        let bytes = tokio::fs::read(video.path()).await.map_err(|e| {
            PipelineError::stage_failed(Stage::Analyze, format!("could not read upload: {}", e))
        })?;

        let outcome = Poller::new(self, self.poll, Stage::Analyze)
            .run(&bytes, cancel)
            .await?;

        let operation = self
            .client
            .get_operation(&outcome.locator)
            .await
            .map_err(|e| PipelineError::from_client(Stage::Analyze, e))?;

        let empty = AnnotationResult::default();
        let context = render_context(operation.annotation().unwrap_or(&empty));
        if context == MINIMAL_ANALYSIS_FALLBACK {
            warn!(operation = %outcome.locator, "annotation was empty, using fallback description");
        }

        info!(chars = context.len(), polls = outcome.polls, "video analysis complete");
        Ok(context)
    }
}
