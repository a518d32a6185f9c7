//! Long-running remote job poller.
//!
//! A job is submitted once and then observed every `interval` until it
//! reaches a terminal state or the wall-clock deadline (measured from
//! submission) passes. The state machine itself is the pure
//! [`PollState::next`] function so it can be tested without a clock.
//!
//! ```text
//! Submitted ──► Processing ──► Complete(locator)
//!                   │  ▲    ├─► Error(message)
//!                   └──┘    ├─► TimedOut   (best-effort remote cancel)
//!        (status or fetch   └─► Cancelled  (best-effort remote cancel)
//!         failure)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bruno_ml_client::MlClientResult;
use bruno_models::{RemoteJobHandle, RemoteJobStatus, RemoteStatusReport, Stage};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::config::PollerConfig;
use crate::error::{PipelineError, PipelineResult};

/// An external service that runs jobs asynchronously.
#[async_trait]
pub trait RemoteJobService: Send + Sync {
    type Request: Send + Sync;

    /// Service name for logs.
    fn name(&self) -> &'static str;

    async fn submit(&self, request: &Self::Request) -> MlClientResult<RemoteJobHandle>;

    async fn fetch_status(&self, handle: &RemoteJobHandle) -> MlClientResult<RemoteStatusReport>;

    async fn cancel(&self, handle: &RemoteJobHandle) -> MlClientResult<()>;
}

/// Poller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Processing,
    Complete(String),
    Error(String),
    TimedOut,
    Cancelled,
}

/// Input to one state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Status(RemoteStatusReport),
    /// The status fetch itself failed (network blip, 5xx)
    FetchFailed,
    DeadlineExceeded,
    CancelRequested,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Submitted | PollState::Processing)
    }

    /// Next state after `observation`. Terminal states absorb everything.
    pub fn next(&self, observation: &Observation) -> PollState {
        if self.is_terminal() {
            return self.clone();
        }

        match observation {
            Observation::DeadlineExceeded => PollState::TimedOut,
            Observation::CancelRequested => PollState::Cancelled,
            Observation::FetchFailed => PollState::Processing,
            Observation::Status(report) => match report.status {
                RemoteJobStatus::Submitted | RemoteJobStatus::Processing => PollState::Processing,
                RemoteJobStatus::Complete => {
                    PollState::Complete(report.result_locator.clone().unwrap_or_default())
                }
                RemoteJobStatus::Error => PollState::Error(
                    report
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "Unknown error".to_string()),
                ),
            },
        }
    }
}

/// Successful poll result.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub handle: RemoteJobHandle,
    /// Non-empty result locator
    pub locator: String,
    /// Status fetches issued
    pub polls: u32,
    pub elapsed: Duration,
}

/// Drives a [`RemoteJobService`] job to completion.
pub struct Poller<'a, S: RemoteJobService> {
    service: &'a S,
    config: PollerConfig,
    stage: Stage,
}

impl<'a, S: RemoteJobService> Poller<'a, S> {
    pub fn new(service: &'a S, config: PollerConfig, stage: Stage) -> Self {
        Self {
            service,
            config,
            stage,
        }
    }

    /// Submit `request` and poll until a terminal state.
    pub async fn run(&self, request: &S::Request, cancel: &CancelSignal) -> PipelineResult<PollOutcome> {
        let service = self.service.name();

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage: self.stage });
        }

        let mut handle = self
            .service
            .submit(request)
            .await
            .map_err(|e| PipelineError::from_client(self.stage, e))?;

        // Deadline counts from acceptance of the submission.
        let started = Instant::now();
        let mut state = PollState::Submitted;
        let mut polls = 0u32;

        info!(service, remote_job_id = %handle.id, "remote job submitted");

        while !state.is_terminal() {
            let remaining = self.config.deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                state = state.next(&Observation::DeadlineExceeded);
                break;
            }

            let wait = self.config.interval.min(remaining);
            let woke = tokio::select! {
                _ = tokio::time::sleep(wait) => true,
                _ = cancel.cancelled() => false,
            };
            if !woke {
                state = state.next(&Observation::CancelRequested);
                break;
            }

            polls += 1;
            let observation = tokio::select! {
                result = self.service.fetch_status(&handle) => match result {
                    Ok(report) => {
                        handle.observe(&report);
                        Observation::Status(report)
                    }
                    Err(e) => {
                        warn!(
                            service,
                            remote_job_id = %handle.id,
                            error = %e,
                            "status fetch failed, retrying next tick"
                        );
                        Observation::FetchFailed
                    }
                },
                _ = cancel.cancelled() => Observation::CancelRequested,
            };

            state = state.next(&observation);
            debug!(
                service,
                remote_job_id = %handle.id,
                poll = polls,
                elapsed_s = started.elapsed().as_secs(),
                status = %handle.status,
                "remote job polled"
            );

            if !state.is_terminal() && started.elapsed() >= self.config.deadline {
                state = state.next(&Observation::DeadlineExceeded);
            }
        }

        let elapsed = started.elapsed();
        match state {
            PollState::Complete(locator) if !locator.trim().is_empty() => {
                info!(service, remote_job_id = %handle.id, polls, "remote job complete");
                Ok(PollOutcome {
                    handle,
                    locator,
                    polls,
                    elapsed,
                })
            }
            PollState::Complete(_) => Err(PipelineError::MalformedCompletion { stage: self.stage }),
            PollState::Error(message) => {
                warn!(service, remote_job_id = %handle.id, %message, "remote job failed");
                Err(PipelineError::RemoteJobFailed {
                    stage: self.stage,
                    message,
                })
            }
            // The loop only exits in a terminal state.
            PollState::TimedOut | PollState::Submitted | PollState::Processing => {
                warn!(
                    service,
                    remote_job_id = %handle.id,
                    elapsed_s = elapsed.as_secs(),
                    "remote job deadline exceeded"
                );
                self.cancel_remote(&handle).await;
                Err(PipelineError::Timeout {
                    stage: self.stage,
                    elapsed,
                })
            }
            PollState::Cancelled => {
                info!(service, remote_job_id = %handle.id, "remote job cancelled by caller");
                self.cancel_remote(&handle).await;
                Err(PipelineError::Cancelled { stage: self.stage })
            }
        }
    }

    async fn cancel_remote(&self, handle: &RemoteJobHandle) {
        if let Err(e) = self.service.cancel(handle).await {
            warn!(
                service = self.service.name(),
                remote_job_id = %handle.id,
                error = %e,
                "best-effort remote cancellation failed"
            );
        }
    }
}
