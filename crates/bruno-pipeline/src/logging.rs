//! Structured per-job logging.

use std::time::Duration;

use bruno_models::{JobId, Stage};
use tracing::{error, info, warn, Span};

/// Logger that stamps every record with the job id and operation.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// `operation` names the entry point, e.g. `generate` or `analyze_only`.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, operation = %self.operation, "Job started: {}", message);
    }

    pub fn log_stage_start(&self, stage: Stage) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = %stage,
            "Stage started"
        );
    }

    pub fn log_stage_done(&self, stage: Stage, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage completed"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, operation = %self.operation, "Job warning: {}", message);
    }

    pub fn log_error(&self, stage: Option<Stage>, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = stage.map(|s| s.as_str()).unwrap_or("none"),
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, operation = %self.operation, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = %self.operation)
    }
}
