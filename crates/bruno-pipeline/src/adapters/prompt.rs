use std::sync::Arc;

use async_trait::async_trait;
use bruno_ml_client::{ChatMessage, OpenAiClient};
use bruno_models::{format_seconds, PromptBundle, SectionTimings, Stage};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::stages::{PromptComposer, StageResult};

pub const DEFAULT_TAGS: &str = "Cinematic, 100 BPM";
pub const DEFAULT_NEGATIVE_TAGS: &str = "harsh, distorted, chaotic, muddy, robotic";

/// The generated text must mention the duration this often.
const MIN_DURATION_MENTIONS: usize = 4;

/// Candidate tag lines must be shorter than this.
const MAX_TAG_LINE_CHARS: usize = 120;

const SYSTEM_PROMPT: &str = "\
You write prompts for a text-to-music generator. Each prompt contains lyrics \
grounded in a video, a sectioned song structure, and exact timing.

LYRICS
- Describe what can be seen: actions, places, movement, concrete objects.
- Do not copy mood words from the analysis and do not mention music, \
instruments or sound.
- Pick the genre that fits the footage and write the way typical \
mainstream songs of that genre are written: plain phrasing, short lines, \
simple hooks.
- Two to four short lines per lyrical section.

STRUCTURE
Every section starts with a bracketed header, followed by one style line:
[Section - X to Y seconds]
Genre first, 2-3 instruments, vocal type or \"pure instrumental, no vocals\", \
production tone, BPM
Use four to seven descriptors, always include BPM, and keep BPM constant.

TIMING
- The track ends exactly at the given duration. Write the number as given \
(17.4 stays 17.4).
- State the duration at least four times.
- The outro says when the fade begins, when vocals fade, and that there is \
silence by the end.
- The last line is exactly:
TOTAL TRACK LENGTH: END SECONDS. HARD STOP AT END SECONDS.

Output only the prompt. No commentary before or after it.";

/// Prompt composition through OpenAI chat completions.
pub struct OpenAiPromptComposer {
    client: Arc<OpenAiClient>,
}

impl OpenAiPromptComposer {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }

    async fn negative_tags(&self, context: &str, tags: &str) -> Option<String> {
        let request = format!(
            "Suggest 3-5 music style tags that would clash with this video and these styles.\n\n\
             VIDEO CONTEXT:\n{context}\n\nPOSITIVE TAGS:\n{tags}\n\n\
             Reply with a comma-separated list only."
        );
        let config = self.client.config();

        match self
            .client
            .chat(
                &[ChatMessage::user(request)],
                config.negative_temperature,
                config.negative_max_tokens,
            )
            .await
        {
            Ok(reply) if !reply.trim().is_empty() => Some(reply.trim().to_string()),
            Ok(_) => {
                warn!("negative tag reply was empty, using defaults");
                None
            }
            Err(e) => {
                warn!(error = %e, "negative tag request failed, using defaults");
                None
            }
        }
    }
}

/// User message carrying the duration, the analysis and the section plan.
pub fn build_user_message(context: &str, duration: f64, timings: &SectionTimings) -> String {
    let d = format_seconds(duration);
    let intro = format_seconds(timings.intro_end);
    let verse = format_seconds(timings.verse_end);
    let outro = format_seconds(timings.outro_start);

    format!(
        "VIDEO DURATION: {d} seconds\n\
         TRACK MUST END EXACTLY AT {d} seconds\n\n\
         VIDEO ANALYSIS:\n{context}\n\n\
         SECTION PLAN:\n\
         - Intro: 0 to ~{intro} seconds\n\
         - Verse: ~{intro} to ~{verse} seconds\n\
         - Outro: ~{outro} to {d} seconds\n\n\
         State the duration ({d} seconds) at least {MIN_DURATION_MENTIONS} times.\n\
         Final line must be:\n\
         TOTAL TRACK LENGTH: {d} SECONDS. HARD STOP AT {d} SECONDS."
    )
}

/// Style line from the first bracketed section header.
///
/// Of the two lines after the first line starting with `[`, the first
/// non-empty one containing a comma and shorter than 120 characters wins.
pub fn extract_tags(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let header = lines.iter().position(|l| l.trim().starts_with('['))?;

    lines
        .iter()
        .skip(header + 1)
        .take(2)
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && l.contains(',') && l.chars().count() < MAX_TAG_LINE_CHARS)
        .map(str::to_string)
}

/// Append the closing timing lines when the duration is under-mentioned.
///
/// The appended block alone mentions the duration four times and ends with
/// the stamp line. Returns the text and whether the block was added.
pub fn ensure_duration_stamp(text: &str, duration: f64) -> (String, bool) {
    let d = format_seconds(duration);
    if count_number_mentions(text, &d) >= MIN_DURATION_MENTIONS {
        return (text.to_string(), false);
    }
    let stamped = format!(
        "{}\n\nComplete silence by {d} seconds. ENDS AT {d} SECONDS.\n\
         TOTAL TRACK LENGTH: {d} SECONDS. HARD STOP AT {d} SECONDS.",
        text.trim_end()
    );
    (stamped, true)
}

/// Occurrences of `number` that stand alone, not inside a longer number
/// such as `100` or `10.5`. A sentence-ending period still counts.
fn count_number_mentions(text: &str, number: &str) -> usize {
    let bytes = text.as_bytes();
    text.match_indices(number)
        .filter(|&(start, _)| {
            let end = start + number.len();
            let before = start.checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(end).copied();
            let after_decimal = after == Some(b'.')
                && bytes.get(end + 1).is_some_and(|b| b.is_ascii_digit());

            !matches!(before, Some(b) if b.is_ascii_digit() || b == b'.')
                && !matches!(after, Some(b) if b.is_ascii_digit())
                && !after_decimal
        })
        .count()
}

#[async_trait]
impl PromptComposer for OpenAiPromptComposer {
    async fn compose(
        &self,
        context: &str,
        duration: f64,
        timings: &SectionTimings,
    ) -> StageResult<PromptBundle> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PipelineError::stage_failed(
                Stage::ComposePrompt,
                "video duration is required to plan music timing",
            ));
        }

        let config = self.client.config();
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_message(context, duration, timings)),
        ];

        let reply = self
            .client
            .chat(&messages, config.temperature, config.max_tokens)
            .await
            .map_err(|e| PipelineError::from_client(Stage::ComposePrompt, e))?;
        if reply.trim().is_empty() {
            return Err(PipelineError::stage_failed(
                Stage::ComposePrompt,
                "language model returned an empty prompt",
            ));
        }

        let (prompt, stamped) = ensure_duration_stamp(&reply, duration);
        if stamped {
            warn!(
                duration = %format_seconds(duration),
                "generated prompt under-states the duration, appended stamp line"
            );
        }

        let (tags, tags_defaulted) = match extract_tags(&prompt) {
            Some(tags) => (tags, false),
            None => {
                warn!("no style line found in generated prompt, using default tags");
                (DEFAULT_TAGS.to_string(), true)
            }
        };

        let (negative_tags, negative_tags_defaulted) = match self.negative_tags(context, &tags).await {
            Some(neg) => (neg, false),
            None => (DEFAULT_NEGATIVE_TAGS.to_string(), true),
        };

        info!(tags = %tags, negative_tags = %negative_tags, chars = prompt.len(), "prompt composed");

        Ok(PromptBundle {
            prompt,
            tags,
            negative_tags,
            tags_defaulted,
            negative_tags_defaulted,
        })
    }
}
