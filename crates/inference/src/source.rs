//! Where a job's status comes from.
//!
//! [`JobSource`] is chosen once from the handle's origin at submission
//! time and fixed for the job's lifetime. Both variants answer the same
//! question (what is the status right now?) so the poller never branches
//! on the job kind itself.

use std::sync::Arc;

use tokio::time::Instant;
use vidgen_core::job::{JobHandle, JobOrigin};
use vidgen_core::simulation::DemoFallbackSimulator;

use crate::api::InferenceApi;
use crate::error::{ApiError, JobError};
use crate::messages::RemoteStatus;

/// Message used when the service reports an error without details.
const GENERIC_FAILURE_MESSAGE: &str = "Video generation failed";

/// What one status check found.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Still running. `None` fields keep the previous reading.
    Progress {
        progress: Option<f64>,
        eta_secs: Option<f64>,
    },
    Completed { result_url: String },
    /// The service reported the job as failed.
    Failed(JobError),
}

/// Polls the remote service.
#[derive(Clone)]
pub struct RemoteJob {
    api: Arc<InferenceApi>,
}

impl RemoteJob {
    pub fn new(api: Arc<InferenceApi>) -> Self {
        Self { api }
    }

    async fn poll(&self, handle: &JobHandle) -> Result<PollOutcome, JobError> {
        let status = self.api.job_status(handle.id()).await?;
        Ok(match status.status {
            RemoteStatus::Processing => PollOutcome::Progress {
                progress: status.progress,
                eta_secs: status.eta,
            },
            RemoteStatus::Completed => match &status.output {
                Some(output) => PollOutcome::Completed {
                    result_url: self.api.resolve_output(output)?,
                },
                // Done but the output is not attached yet; keep polling.
                None => PollOutcome::Progress {
                    progress: Some(100.0),
                    eta_secs: Some(0.0),
                },
            },
            RemoteStatus::Error => PollOutcome::Failed(
                ApiError::ServerError {
                    status: None,
                    message: status
                        .error
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
                }
                .into(),
            ),
        })
    }
}

/// Computes status locally from elapsed time.
#[derive(Clone, Copy)]
pub struct SimulatedJob {
    simulator: DemoFallbackSimulator,
}

impl SimulatedJob {
    pub fn new(simulator: DemoFallbackSimulator) -> Self {
        Self { simulator }
    }

    fn poll(&self, handle: &JobHandle) -> PollOutcome {
        let status = self.simulator.status_at(handle, Instant::now());
        match status.result_url {
            Some(url) => PollOutcome::Completed {
                result_url: url.to_string(),
            },
            None => PollOutcome::Progress {
                progress: Some(status.progress),
                eta_secs: Some(status.estimated_seconds_remaining),
            },
        }
    }
}

#[derive(Clone)]
pub enum JobSource {
    Remote(RemoteJob),
    Simulated(SimulatedJob),
}

impl JobSource {
    /// Pick the source matching the handle's origin.
    pub fn for_handle(
        handle: &JobHandle,
        api: &Arc<InferenceApi>,
        simulator: DemoFallbackSimulator,
    ) -> Self {
        match handle.origin() {
            JobOrigin::Remote => Self::Remote(RemoteJob::new(Arc::clone(api))),
            JobOrigin::Simulated => Self::Simulated(SimulatedJob::new(simulator)),
        }
    }

    /// Check the job's status once.
    ///
    /// `Err` means this check could not be completed; whether that ends
    /// the job is the caller's decision (see [`JobError::is_transient`]).
    pub async fn poll(&self, handle: &JobHandle) -> Result<PollOutcome, JobError> {
        match self {
            Self::Remote(remote) => remote.poll(handle).await,
            Self::Simulated(simulated) => Ok(simulated.poll(handle)),
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }
}
