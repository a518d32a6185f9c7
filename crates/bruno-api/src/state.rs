//! Application state.

use std::sync::Arc;

use bruno_ml_client::{
    OpenAiClient, OpenAiConfig, SunoClient, SunoConfig, VideoIntelligenceClient,
    VideoIntelligenceConfig,
};
use bruno_pipeline::adapters::{
    FfmpegMerger, FfprobeDurationProbe, OpenAiPromptComposer, SunoAudioGenerator,
    VideoIntelligenceAnalyzer,
};
use bruno_pipeline::{Orchestrator, PipelineConfig, StageSet};

use crate::admission::AdmissionController;
use crate::config::ApiConfig;
use crate::error::redact_internal_errors;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
    /// Budget of full pipeline runs
    pub pipeline_admission: Arc<AdmissionController>,
    /// Budget of analyze-only / prompt-only runs
    pub debug_admission: Arc<AdmissionController>,
}

impl AppState {
    /// Build state with the real collaborators configured from the environment.
    pub fn new(config: ApiConfig, pipeline: PipelineConfig) -> anyhow::Result<Self> {
        let stages = default_stages(&pipeline)?;
        Ok(Self::with_orchestrator(config, Orchestrator::new(pipeline, stages)))
    }

    pub fn with_orchestrator(config: ApiConfig, orchestrator: Orchestrator) -> Self {
        redact_internal_errors(config.is_production());
        let admission = config.admission;
        Self {
            pipeline_admission: Arc::new(AdmissionController::new(
                "pipeline",
                admission.window,
                admission.budget,
            )),
            debug_admission: Arc::new(AdmissionController::new(
                "debug",
                admission.window,
                admission.debug_budget,
            )),
            orchestrator: Arc::new(orchestrator),
            config,
        }
    }
}

fn default_stages(pipeline: &PipelineConfig) -> anyhow::Result<StageSet> {
    let video_intelligence =
        VideoIntelligenceClient::with_service_account(VideoIntelligenceConfig::from_env())?;
    let openai = OpenAiClient::new(OpenAiConfig::from_env())?;
    let suno = SunoClient::new(SunoConfig::from_env())?;

    Ok(StageSet {
        probe: Arc::new(FfprobeDurationProbe),
        analyzer: Arc::new(VideoIntelligenceAnalyzer::new(
            Arc::new(video_intelligence),
            pipeline.analysis_poll,
        )),
        composer: Arc::new(OpenAiPromptComposer::new(Arc::new(openai))),
        generator: Arc::new(SunoAudioGenerator::new(Arc::new(suno), pipeline.audio_poll)),
        merger: Arc::new(FfmpegMerger::new(pipeline.merge_timeout)),
    })
}
