//! Pipeline error taxonomy.

use std::time::Duration;

use bruno_media::MediaError;
use bruno_ml_client::MlClientError;
use bruno_models::Stage;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Which collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFailureKind {
    AnalysisFailed,
    PromptFailed,
    AudioGenFailed,
    MergeFailed,
}

impl StageFailureKind {
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Analyze => StageFailureKind::AnalysisFailed,
            Stage::ComposePrompt => StageFailureKind::PromptFailed,
            Stage::GenerateAudio => StageFailureKind::AudioGenFailed,
            Stage::Merge => StageFailureKind::MergeFailed,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad input; never retried.
    #[error("{0}")]
    Validation(String),

    #[error("Video is too long ({duration:.1}s). Maximum allowed duration is {ceiling} seconds.")]
    VideoTooLong { duration: f64, ceiling: f64 },

    /// The collaborator itself errored.
    #[error("{} failed: {message}", .stage.display_name())]
    Stage {
        stage: Stage,
        kind: StageFailureKind,
        message: String,
    },

    #[error("{} timed out after {}s", .stage.display_name(), .elapsed.as_secs())]
    Timeout { stage: Stage, elapsed: Duration },

    #[error("{} failed: {message}", .stage.display_name())]
    RemoteJobFailed { stage: Stage, message: String },

    #[error("{} failed: remote job completed without a result", .stage.display_name())]
    MalformedCompletion { stage: Stage },

    #[error("{} cancelled", .stage.display_name())]
    Cancelled { stage: Stage },

    /// Artifact could not be created.
    #[error("Artifact error: {0}")]
    Resource(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Collaborator failure attributed to `stage`.
    pub fn stage_failed(stage: Stage, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            kind: StageFailureKind::for_stage(stage),
            message: message.into(),
        }
    }

    /// Map a remote client error onto `stage`.
    pub fn from_client(stage: Stage, err: MlClientError) -> Self {
        Self::stage_failed(stage, err.to_string())
    }

    /// Map a media error onto `stage`; cancellation and timeouts keep their kind.
    pub fn from_media(stage: Stage, err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => Self::Cancelled { stage },
            MediaError::Timeout(secs) => Self::Timeout {
                stage,
                elapsed: Duration::from_secs(secs),
            },
            MediaError::Artifact(msg) => Self::Resource(msg),
            other => Self::stage_failed(stage, other.detailed_message()),
        }
    }

    /// Stage the failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. }
            | PipelineError::Timeout { stage, .. }
            | PipelineError::RemoteJobFailed { stage, .. }
            | PipelineError::MalformedCompletion { stage }
            | PipelineError::Cancelled { stage } => Some(*stage),
            PipelineError::Validation(_)
            | PipelineError::VideoTooLong { .. }
            | PipelineError::Resource(_) => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_) | PipelineError::VideoTooLong { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }

    /// Message shown to the caller: stage attribution plus root cause.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Short label for metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) | PipelineError::VideoTooLong { .. } => "validation",
            PipelineError::Stage { .. } => "remote_call",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::RemoteJobFailed { .. } => "remote_job",
            PipelineError::MalformedCompletion { .. } => "malformed_completion",
            PipelineError::Cancelled { .. } => "cancelled",
            PipelineError::Resource(_) => "resource",
        }
    }
}

impl From<MediaError> for PipelineError {
    /// Media errors outside a stage (artifact allocation, persistence).
    fn from(err: MediaError) -> Self {
        Self::Resource(err.to_string())
    }
}
