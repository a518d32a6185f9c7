//! Prompt bundles and duration-derived section timings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest intro section, in seconds.
pub const MAX_INTRO_SECS: f64 = 8.0;

/// Outro length reserved at the end of the track, in seconds.
pub const OUTRO_RESERVE_SECS: f64 = 3.0;

/// Invalid duration supplied for timing computation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("duration must be a positive number of seconds, got {0}")]
pub struct DurationError(pub f64);

/// Section boundaries handed to the prompt composer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionTimings {
    /// End of the intro section (seconds)
    pub intro_end: f64,
    /// End of the verse section (seconds)
    pub verse_end: f64,
    /// Start of the outro section (seconds)
    pub outro_start: f64,
}

impl SectionTimings {
    /// Compute section boundaries for a track of `duration` seconds.
    ///
    /// - intro ends at `min(0.25 * d, 8)`
    /// - verse ends at `min(0.75 * d, d - 3)`
    /// - outro starts where the verse ends
    ///
    /// For tracks shorter than 4 seconds `d - 3` falls below the intro end;
    /// the verse end is then held at the intro end so the sections never
    /// run backwards.
    pub fn for_duration(duration: f64) -> Result<Self, DurationError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(DurationError(duration));
        }

        let intro_end = (duration * 0.25).min(MAX_INTRO_SECS);
        let verse_end = (duration * 0.75)
            .min(duration - OUTRO_RESERVE_SECS)
            .max(intro_end);

        Ok(Self {
            intro_end,
            verse_end,
            outro_start: verse_end,
        })
    }
}

/// Render seconds without trailing zeros (17.4 -> "17.4", 20.0 -> "20").
///
/// At most two decimals are kept.
pub fn format_seconds(seconds: f64) -> String {
    let s = format!("{:.2}", seconds);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Output of the compose-prompt stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PromptBundle {
    /// Full generation prompt (lyrics, structure, timing)
    pub prompt: String,
    /// Comma-separated style tags
    pub tags: String,
    /// Comma-separated styles to avoid
    pub negative_tags: String,
    /// Tags fell back to the fixed default
    #[serde(default)]
    pub tags_defaulted: bool,
    /// Negative tags fell back to the fixed default
    #[serde(default)]
    pub negative_tags_defaulted: bool,
}

impl PromptBundle {
    /// Describe silent fallbacks taken while composing, if any.
    pub fn degradation_note(&self) -> Option<String> {
        match (self.tags_defaulted, self.negative_tags_defaulted) {
            (false, false) => None,
            (true, false) => Some("default style tags used".to_string()),
            (false, true) => Some("default negative tags used".to_string()),
            (true, true) => Some("default style and negative tags used".to_string()),
        }
    }
}
