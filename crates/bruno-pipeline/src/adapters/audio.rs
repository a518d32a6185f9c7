use std::sync::Arc;

use async_trait::async_trait;
use bruno_media::{ArtifactJanitor, TransientArtifact};
use bruno_ml_client::{audio_extension, GenerateRequest, MlClientResult, SunoClient};
use bruno_models::{ArtifactKind, PromptBundle, RemoteJobHandle, RemoteStatusReport, Stage};
use tracing::info;

use crate::cancel::CancelSignal;
use crate::config::PollerConfig;
use crate::error::PipelineError;
use crate::poller::{Poller, RemoteJobService};
use crate::stages::{AudioGenerator, StageResult};

/// Music generation through Suno.
pub struct SunoAudioGenerator {
    client: Arc<SunoClient>,
    poll: PollerConfig,
}

impl SunoAudioGenerator {
    pub fn new(client: Arc<SunoClient>, poll: PollerConfig) -> Self {
        Self { client, poll }
    }
}

#[async_trait]
impl RemoteJobService for SunoAudioGenerator {
    type Request = GenerateRequest;

    fn name(&self) -> &'static str {
        "suno"
    }

    async fn submit(&self, request: &GenerateRequest) -> MlClientResult<RemoteJobHandle> {
        let id = self.client.submit(request).await?;
        Ok(RemoteJobHandle::submitted(id))
    }

    async fn fetch_status(&self, handle: &RemoteJobHandle) -> MlClientResult<RemoteStatusReport> {
        self.client.clip_status(&handle.id).await
    }

    async fn cancel(&self, handle: &RemoteJobHandle) -> MlClientResult<()> {
        self.client.cancel(&handle.id).await
    }
}

#[async_trait]
impl AudioGenerator for SunoAudioGenerator {
    async fn generate(
        &self,
        bundle: &PromptBundle,
        duration: f64,
        janitor: &ArtifactJanitor,
        cancel: &CancelSignal,
    ) -> StageResult<TransientArtifact> {
        let request = GenerateRequest::new(
            bundle.prompt.clone(),
            bundle.tags.clone(),
            Some(bundle.negative_tags.clone()),
            Some(duration),
        );

        let outcome = Poller::new(self, self.poll, Stage::GenerateAudio)
            .run(&request, cancel)
            .await?;

        let audio = janitor.acquire_with_extension(
            ArtifactKind::GeneratedAudio,
            audio_extension(&outcome.locator),
        )?;

        match self.client.download(&outcome.locator, audio.path()).await {
            Ok(bytes) => {
                info!(
                    clip_id = %outcome.handle.id,
                    polls = outcome.polls,
                    elapsed_s = outcome.elapsed.as_secs(),
                    bytes,
                    "audio generated"
                );
                Ok(audio)
            }
            Err(e) => {
                janitor.release(&audio).await;
                Err(PipelineError::from_client(Stage::GenerateAudio, e))
            }
        }
    }
}
