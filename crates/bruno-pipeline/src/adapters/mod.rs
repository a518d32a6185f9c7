//! Stage implementations backed by the real collaborators.

mod analysis;
mod audio;
mod merge;
mod probe;
mod prompt;

pub use analysis::VideoIntelligenceAnalyzer;
pub use audio::SunoAudioGenerator;
pub use merge::FfmpegMerger;
pub use probe::FfprobeDurationProbe;
pub use prompt::{
    ensure_duration_stamp, extract_tags, OpenAiPromptComposer, DEFAULT_NEGATIVE_TAGS, DEFAULT_TAGS,
};
