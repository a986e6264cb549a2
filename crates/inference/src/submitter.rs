//! Job submission with an optional simulated fallback.
//!
//! [`JobSubmitter`] sends a request through [`InferenceApi`] and, for a
//! valid response, returns a remote [`JobHandle`]. What happens on
//! failure is decided by the configured [`FallbackPolicy`]: the error is
//! either returned, or replaced by a simulated handle that carries the
//! cause along for logging.

use std::sync::Arc;

use vidgen_core::job::{JobHandle, JobKind};
use vidgen_core::request::JobRequest;

use crate::api::{Accepted, InferenceApi};
use crate::config::FallbackPolicy;
use crate::error::JobError;

/// A job ready to be polled.
#[derive(Debug, Clone)]
pub struct Submission {
    pub handle: JobHandle,
    /// Seconds, shown to the user until the first poll tick lands.
    pub initial_eta_secs: f64,
    /// Why this job is simulated, when it fell back after a failure.
    pub fallback_cause: Option<JobError>,
}

pub struct JobSubmitter {
    api: Arc<InferenceApi>,
    policy: FallbackPolicy,
}

impl JobSubmitter {
    pub fn new(api: Arc<InferenceApi>, policy: FallbackPolicy) -> Self {
        Self { api, policy }
    }

    /// Submit either kind of request.
    pub async fn submit(&self, request: &JobRequest) -> Result<Submission, JobError> {
        let kind = request.kind();
        if self.policy == FallbackPolicy::Always {
            let submission = simulated(kind, None);
            tracing::info!(
                job_id = %submission.handle.id(),
                kind = kind.as_str(),
                "Demo mode: job simulated without contacting the service",
            );
            return Ok(submission);
        }

        let outcome = match request {
            JobRequest::Text(req) => self.api.submit_text(req).await,
            JobRequest::Image(req) => self.api.submit_image(req).await,
        };
        self.settle(kind, outcome)
    }

    fn settle(
        &self,
        kind: JobKind,
        outcome: Result<Accepted, JobError>,
    ) -> Result<Submission, JobError> {
        match outcome {
            Ok(accepted) => {
                let handle = JobHandle::remote(accepted.job_id, kind);
                let initial_eta_secs = accepted.eta_secs.unwrap_or_else(|| kind.default_eta_secs());
                tracing::info!(
                    job_id = %handle.id(),
                    kind = kind.as_str(),
                    initial_eta_secs,
                    "Job accepted by the service",
                );
                Ok(Submission {
                    handle,
                    initial_eta_secs,
                    fallback_cause: None,
                })
            }
            Err(error) if self.policy == FallbackPolicy::OnFailure => {
                tracing::warn!(
                    kind = kind.as_str(),
                    error = %error,
                    "Submission failed, falling back to a simulated job",
                );
                let submission = simulated(kind, Some(error));
                tracing::info!(job_id = %submission.handle.id(), "Simulated job created");
                Ok(submission)
            }
            Err(error) => {
                tracing::error!(kind = kind.as_str(), error = %error, "Submission failed");
                Err(error)
            }
        }
    }
}

fn simulated(kind: JobKind, cause: Option<JobError>) -> Submission {
    Submission {
        handle: JobHandle::simulated(kind),
        initial_eta_secs: kind.default_eta_secs(),
        fallback_cause: cause,
    }
}
