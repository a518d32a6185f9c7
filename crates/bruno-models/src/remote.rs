//! Remote long-running job handles.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by an external job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobStatus {
    /// Accepted, not yet picked up
    #[default]
    Submitted,
    /// Work in progress
    Processing,
    /// Finished successfully
    Complete,
    /// Finished with an error
    Error,
}

impl RemoteJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteJobStatus::Submitted => "submitted",
            RemoteJobStatus::Processing => "processing",
            RemoteJobStatus::Complete => "complete",
            RemoteJobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteJobStatus::Complete | RemoteJobStatus::Error)
    }
}

impl fmt::Display for RemoteJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One status observation returned by a status fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RemoteStatusReport {
    pub status: RemoteJobStatus,
    /// Where the result can be retrieved (set on completion)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_locator: Option<String>,
    /// Remote-provided failure message (set on error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RemoteStatusReport {
    pub fn submitted() -> Self {
        Self {
            status: RemoteJobStatus::Submitted,
            result_locator: None,
            error_message: None,
        }
    }

    pub fn processing() -> Self {
        Self {
            status: RemoteJobStatus::Processing,
            ..Self::submitted()
        }
    }

    pub fn complete(locator: impl Into<String>) -> Self {
        Self {
            status: RemoteJobStatus::Complete,
            result_locator: Some(locator.into()),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RemoteJobStatus::Error,
            result_locator: None,
            error_message: Some(message.into()),
        }
    }
}

/// Identifier and last-known status of a job running inside an external
/// service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RemoteJobHandle {
    /// External-service job id
    pub id: String,
    /// Last-known status
    pub status: RemoteJobStatus,
    /// Result locator once complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_locator: Option<String>,
    /// When the job was submitted
    pub submitted_at: DateTime<Utc>,
}

impl RemoteJobHandle {
    /// Handle for a freshly submitted job.
    pub fn submitted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: RemoteJobStatus::Submitted,
            result_locator: None,
            submitted_at: Utc::now(),
        }
    }

    /// Apply a status observation.
    pub fn observe(&mut self, report: &RemoteStatusReport) {
        self.status = report.status;
        if let Some(locator) = &report.result_locator {
            self.result_locator = Some(locator.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_observe() {
        let mut handle = RemoteJobHandle::submitted("clip-1");
        assert_eq!(handle.status, RemoteJobStatus::Submitted);

        handle.observe(&RemoteStatusReport::processing());
        assert_eq!(handle.status, RemoteJobStatus::Processing);
        assert!(!handle.status.is_terminal());

        handle.observe(&RemoteStatusReport::complete("https://cdn.example/a.mp3"));
        assert!(handle.status.is_terminal());
        assert_eq!(handle.result_locator.as_deref(), Some("https://cdn.example/a.mp3"));
    }
}
