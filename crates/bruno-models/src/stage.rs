//! Pipeline stage identities.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::progress::checkpoints;

/// One atomic step of the pipeline.
///
/// The order is fixed: analyze, compose prompt, generate audio, merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Visual analysis of the uploaded video
    Analyze,
    /// Music prompt synthesis from the analysis text
    ComposePrompt,
    /// Remote audio generation (long-running job)
    GenerateAudio,
    /// Local audio/video mux
    Merge,
}

impl Stage {
    /// All stages in execution order.
    pub const ORDER: [Stage; 4] = [
        Stage::Analyze,
        Stage::ComposePrompt,
        Stage::GenerateAudio,
        Stage::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::ComposePrompt => "compose_prompt",
            Stage::GenerateAudio => "generate_audio",
            Stage::Merge => "merge",
        }
    }

    /// Stage id used in progress records sent to callers.
    pub fn progress_id(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyzing",
            Stage::ComposePrompt => "prompting",
            Stage::GenerateAudio => "generating",
            Stage::Merge => "combining",
        }
    }

    /// Human-readable name used in failure messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Analyze => "Video analysis",
            Stage::ComposePrompt => "Prompt generation",
            Stage::GenerateAudio => "Audio generation",
            Stage::Merge => "Media combination",
        }
    }

    /// Progress percentage emitted when the stage starts.
    pub fn start_percent(&self) -> u8 {
        match self {
            Stage::Analyze => checkpoints::ANALYZE_START,
            Stage::ComposePrompt => checkpoints::PROMPT_START,
            Stage::GenerateAudio => checkpoints::AUDIO_START,
            Stage::Merge => checkpoints::MERGE_START,
        }
    }

    /// Progress percentage emitted when the stage completes.
    ///
    /// The merge stage completes the whole job, so it reports 100 via the
    /// terminal `done` record instead.
    pub fn end_percent(&self) -> u8 {
        match self {
            Stage::Analyze => checkpoints::ANALYZE_DONE,
            Stage::ComposePrompt => checkpoints::PROMPT_DONE,
            Stage::GenerateAudio => checkpoints::AUDIO_DONE,
            Stage::Merge => checkpoints::DONE,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_percent_windows_are_ordered() {
        let mut last = 0;
        for stage in Stage::ORDER {
            assert!(stage.start_percent() > last);
            assert!(stage.end_percent() > stage.start_percent());
            last = stage.end_percent();
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_stage_serde_names() {
        let json = serde_json::to_string(&Stage::GenerateAudio).unwrap();
        assert_eq!(json, "\"generate_audio\"");
        assert_eq!(Stage::Merge.progress_id(), "combining");
    }
}
