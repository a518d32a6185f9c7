//! Progress channel between a run and its single consumer.

use bruno_models::{Job, ProgressEvent};
use tokio::sync::mpsc;
use tracing::debug;

/// Buffered records before the producer waits on a slow consumer.
pub const PROGRESS_BUFFER_SIZE: usize = 32;

/// Create a reporter and the receiver its records arrive on.
pub fn progress_channel() -> (ProgressReporter, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER_SIZE);
    (ProgressReporter { tx: Some(tx) }, rx)
}

/// Producer side: records each event on the job, then forwards it.
///
/// Delivery is best effort; a gone consumer does not fail the run.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressReporter {
    /// Reporter that only records on the job.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub async fn emit(&self, job: &mut Job, event: ProgressEvent) {
        let Some(event) = job.record(event) else {
            return;
        };
        debug!(
            job_id = %job.id,
            stage = %event.stage,
            progress = event.progress,
            "{}", event.message
        );

        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                debug!(job_id = %job.id, "progress consumer gone");
            }
        }
    }
}
