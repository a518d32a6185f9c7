//! Progress records streamed to callers.
//!
//! Every record has the same JSON shape on the wire:
//! `{"stage": ..., "message": ..., "progress": ...}`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fixed progress checkpoints emitted at stage boundaries.
pub mod checkpoints {
    pub const UPLOADED: u8 = 10;
    pub const ANALYZE_START: u8 = 15;
    pub const ANALYZE_DONE: u8 = 35;
    pub const PROMPT_START: u8 = 40;
    pub const PROMPT_DONE: u8 = 55;
    pub const AUDIO_START: u8 = 60;
    pub const AUDIO_DONE: u8 = 80;
    pub const MERGE_START: u8 = 85;
    pub const DONE: u8 = 100;
}

/// Stage id of the upload acknowledgement record.
pub const STAGE_UPLOADING: &str = "uploading";
/// Stage id of the terminal success record.
pub const STAGE_DONE: &str = "done";
/// Stage id of the terminal failure record.
pub const STAGE_ERROR: &str = "error";

/// A single progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    /// Stage id (`uploading`, `analyzing`, ..., `done`, `error`)
    pub stage: String,
    /// Human-readable message
    pub message: String,
    /// Percent complete (0-100)
    pub progress: u8,
}

impl ProgressEvent {
    pub fn new(stage: impl Into<String>, message: impl Into<String>, progress: u8) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            progress: progress.min(100),
        }
    }

    /// Upload acknowledgement, always the first record of a run.
    pub fn uploaded() -> Self {
        Self::new(STAGE_UPLOADING, "Video uploaded successfully", checkpoints::UPLOADED)
    }

    /// Terminal success record.
    pub fn done(message: impl Into<String>) -> Self {
        Self::new(STAGE_DONE, message, checkpoints::DONE)
    }

    /// Terminal failure record. Progress is reset to 0.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(STAGE_ERROR, message, 0)
    }

    pub fn is_done(&self) -> bool {
        self.stage == STAGE_DONE
    }

    pub fn is_error(&self) -> bool {
        self.stage == STAGE_ERROR
    }

    /// Check if no further records follow this one.
    pub fn is_terminal(&self) -> bool {
        self.is_done() || self.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_wire_shape() {
        let event = ProgressEvent::new("analyzing", "Video analysis complete", 35);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"stage": "analyzing", "message": "Video analysis complete", "progress": 35})
        );
    }

    #[test]
    fn test_terminal_records() {
        let done = ProgressEvent::done("Complete!");
        assert!(done.is_terminal());
        assert_eq!(done.progress, 100);

        let error = ProgressEvent::error("boom");
        assert!(error.is_error());
        assert_eq!(error.progress, 0);

        assert!(!ProgressEvent::uploaded().is_terminal());
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(ProgressEvent::new("x", "y", 250).progress, 100);
    }
}
