//! Shared data models for the Bruno backend.
//!
//! This crate provides Serde-serializable types for:
//! - Pipeline jobs and their lifecycle status
//! - Pipeline stages and progress records streamed to callers
//! - Prompt bundles and duration-derived section timings
//! - Remote long-running job handles
//! - Transient artifact kinds

pub mod artifact;
pub mod job;
pub mod progress;
pub mod prompt;
pub mod remote;
pub mod stage;

// Re-export common types
pub use artifact::ArtifactKind;
pub use job::{Job, JobId, JobStatus};
pub use progress::{checkpoints, ProgressEvent};
pub use prompt::{format_seconds, DurationError, PromptBundle, SectionTimings};
pub use remote::{RemoteJobHandle, RemoteJobStatus, RemoteStatusReport};
pub use stage::Stage;
