//! Transient artifact kinds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of file-backed blob produced or consumed by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Video uploaded by the caller
    UploadedVideo,
    /// Audio downloaded from the generator
    GeneratedAudio,
    /// Video with the generated audio track
    MergedVideo,
}

impl ArtifactKind {
    /// File name prefix for temporary files of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::UploadedVideo => "upload",
            ArtifactKind::GeneratedAudio => "suno",
            ArtifactKind::MergedVideo => "output",
        }
    }

    /// Extension used when the producer does not know a better one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            ArtifactKind::UploadedVideo => "mp4",
            ArtifactKind::GeneratedAudio => "mp3",
            ArtifactKind::MergedVideo => "mp4",
        }
    }
}
