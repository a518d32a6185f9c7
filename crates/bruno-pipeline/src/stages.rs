//! Stage seams.
//!
//! Each stage is a trait so the orchestrator can be driven by the real
//! collaborators (see [`crate::adapters`]) or by scripted doubles in tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bruno_media::{ArtifactJanitor, TransientArtifact};
use bruno_models::{PromptBundle, SectionTimings};

use crate::cancel::CancelSignal;
use crate::error::PipelineError;

/// Payload of a stage, or a failure carrying the stage identity
/// ([`PipelineError::stage`]).
pub type StageResult<T> = Result<T, PipelineError>;

/// Container-reported duration of a local media file.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, video: &Path) -> StageResult<f64>;
}

/// Video -> analysis text. Never returns blank text.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    async fn analyze(&self, video: &TransientArtifact, cancel: &CancelSignal) -> StageResult<String>;
}

/// Analysis text + duration -> generation prompt.
#[async_trait]
pub trait PromptComposer: Send + Sync {
    async fn compose(
        &self,
        context: &str,
        duration: f64,
        timings: &SectionTimings,
    ) -> StageResult<PromptBundle>;
}

/// Prompt -> audio artifact owned by `janitor`.
///
/// `duration` labels the request only; the generator has no length control.
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    async fn generate(
        &self,
        bundle: &PromptBundle,
        duration: f64,
        janitor: &ArtifactJanitor,
        cancel: &CancelSignal,
    ) -> StageResult<TransientArtifact>;
}

/// Video + audio -> merged artifact owned by `janitor`.
#[async_trait]
pub trait MediaMerger: Send + Sync {
    async fn merge(
        &self,
        video: &TransientArtifact,
        audio: &TransientArtifact,
        janitor: &ArtifactJanitor,
        cancel: &CancelSignal,
    ) -> StageResult<TransientArtifact>;
}

/// The collaborators of one orchestrator.
#[derive(Clone)]
pub struct StageSet {
    pub probe: Arc<dyn DurationProbe>,
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub composer: Arc<dyn PromptComposer>,
    pub generator: Arc<dyn AudioGenerator>,
    pub merger: Arc<dyn MediaMerger>,
}
