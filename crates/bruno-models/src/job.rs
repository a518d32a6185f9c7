//! Pipeline job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::progress::ProgressEvent;
use crate::stage::Stage;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, input not yet validated
    #[default]
    Pending,
    /// Stages are executing
    Running,
    /// Final artifact produced
    Succeeded,
    /// A stage or the input validation failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pipeline execution for one input video.
///
/// Owned by the orchestrator for the lifetime of a single request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Uploaded source video
    pub source_video: PathBuf,

    /// File name supplied by the caller, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,

    /// Locally probed duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Stage currently executing (or the one that failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,

    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress records in emission order
    #[serde(default)]
    pub events: Vec<ProgressEvent>,

    /// Final artifact, once produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job for an uploaded video.
    pub fn new(source_video: impl Into<PathBuf>, original_filename: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_video: source_video.into(),
            original_filename,
            duration: None,
            current_stage: None,
            status: JobStatus::Pending,
            events: Vec::new(),
            output: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job running with its validated duration.
    pub fn start(&mut self, duration: f64) {
        self.duration = Some(duration);
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    /// Record entry into a stage.
    pub fn enter_stage(&mut self, stage: Stage) {
        self.current_stage = Some(stage);
        self.updated_at = Utc::now();
    }

    /// Highest progress recorded so far (error records excluded).
    pub fn last_progress(&self) -> u8 {
        self.events
            .iter()
            .filter(|e| !e.is_error())
            .map(|e| e.progress)
            .max()
            .unwrap_or(0)
    }

    /// Append a progress record and return the record as stored.
    ///
    /// Non-error records never move progress backwards; a lower percent is
    /// raised to the last recorded value. Nothing is recorded after a
    /// terminal record.
    pub fn record(&mut self, event: ProgressEvent) -> Option<ProgressEvent> {
        if self.events.last().is_some_and(ProgressEvent::is_terminal) {
            return None;
        }

        let mut event = event;
        if !event.is_error() {
            event.progress = event.progress.max(self.last_progress());
        }

        self.events.push(event.clone());
        self.updated_at = Utc::now();
        Some(event)
    }

    /// Mark the job succeeded with its final artifact.
    pub fn succeed(&mut self, output: impl Into<PathBuf>) {
        self.status = JobStatus::Succeeded;
        self.output = Some(output.into());
        self.updated_at = Utc::now();
    }

    /// Mark the job failed.
    pub fn fail(&mut self) {
        self.status = JobStatus::Failed;
        self.updated_at = Utc::now();
    }

    /// Sanitized stem of the caller's file name, used for output naming.
    pub fn output_stem(&self) -> String {
        let stem = self
            .original_filename
            .as_deref()
            .and_then(|name| std::path::Path::new(name).file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("");

        let sanitized: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if sanitized.trim_matches('_').is_empty() {
            "output".to_string()
        } else {
            sanitized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new("/tmp/upload.mp4", Some("clip.mp4".into()));
        assert_eq!(job.status, JobStatus::Pending);

        job.start(17.4);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.duration, Some(17.4));

        job.enter_stage(Stage::Analyze);
        assert_eq!(job.current_stage, Some(Stage::Analyze));

        job.succeed("/out/output_clip.mp4");
        assert!(job.status.is_terminal());
        assert!(job.output.is_some());
    }

    #[test]
    fn test_record_keeps_progress_monotonic() {
        let mut job = Job::new("/tmp/a.mp4", None);
        job.record(ProgressEvent::new("analyzing", "a", 35));
        let stored = job.record(ProgressEvent::new("prompting", "b", 20)).unwrap();
        assert_eq!(stored.progress, 35);
    }

    #[test]
    fn test_record_error_then_nothing() {
        let mut job = Job::new("/tmp/a.mp4", None);
        job.record(ProgressEvent::new("analyzing", "a", 35));
        let error = job.record(ProgressEvent::error("failed")).unwrap();
        assert_eq!(error.progress, 0);
        assert!(job.record(ProgressEvent::done("late")).is_none());
        assert_eq!(job.events.len(), 2);
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(Job::new("/x", Some("my clip.mov".into())).output_stem(), "my_clip");
        assert_eq!(Job::new("/x", Some("../..".into())).output_stem(), "output");
        assert_eq!(Job::new("/x", None).output_stem(), "output");
    }
}
