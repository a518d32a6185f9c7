//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    /// `ffmpeg` or `ffprobe` is not installed.
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("{tool} failed: {message}")]
    ToolFailed {
        tool: &'static str,
        message: String,
        /// Tail of the tool's stderr, when captured
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unreadable probe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    /// The file parsed but lacks what the operation needs.
    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Artifact error: {0}")]
    Artifact(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolFailed {
            tool: "ffmpeg",
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn ffprobe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ToolFailed {
            tool: "ffprobe",
            message: message.into(),
            stderr,
            exit_code: None,
        }
    }

    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    pub fn artifact(message: impl Into<String>) -> Self {
        Self::Artifact(message.into())
    }

    /// Message with the captured stderr appended, for failure reports.
    pub fn detailed_message(&self) -> String {
        match self {
            MediaError::ToolFailed {
                message,
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}: {}", message, stderr.trim()),
            other => other.to_string(),
        }
    }
}
