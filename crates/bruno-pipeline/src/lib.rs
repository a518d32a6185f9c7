//! Soundtrack pipeline core.
//!
//! A run takes one uploaded video through four fixed stages: analyze,
//! compose prompt, generate audio, merge. The orchestrator validates the
//! input, sequences the stages, streams progress records and makes sure
//! every transient artifact is gone when the run returns.

pub mod adapters;
pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod poller;
pub mod progress;
pub mod stages;

pub use cancel::{cancel_pair, CancelGuard, CancelSignal};
pub use config::{PipelineConfig, PollerConfig};
pub use error::{PipelineError, PipelineResult, StageFailureKind};
pub use logging::JobLogger;
pub use orchestrator::{AnalysisOutput, Orchestrator, PipelineRequest, PromptOutput, RunOutput};
pub use poller::{PollOutcome, PollState, Poller, RemoteJobService};
pub use progress::{progress_channel, ProgressReporter};
pub use stages::{
    AudioGenerator, DurationProbe, MediaMerger, PromptComposer, StageResult, StageSet,
    VideoAnalyzer,
};
