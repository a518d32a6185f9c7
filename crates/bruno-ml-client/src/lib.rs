//! HTTP clients for the remote collaborators of the soundtrack pipeline.
//!
//! - [`VideoIntelligenceClient`]: Google Video Intelligence REST API
//! - [`OpenAiClient`]: chat completions used for prompt composition
//! - [`SunoClient`]: music generation, clip status and download

pub mod auth;
pub mod error;
pub mod openai;
pub mod suno;
pub mod video_intelligence;

pub use auth::{BearerSource, StaticBearer, TokenCache};
pub use error::{MlClientError, MlClientResult};
pub use openai::{ChatMessage, OpenAiClient, OpenAiConfig};
pub use suno::{audio_extension, GenerateRequest, SunoClient, SunoConfig};
pub use video_intelligence::{
    render_context, AnnotationResult, Operation, VideoIntelligenceClient, VideoIntelligenceConfig,
    MINIMAL_ANALYSIS_FALLBACK,
};

/// Read an env var, falling back to `default` when unset or unparsable.
pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
