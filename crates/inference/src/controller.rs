//! Public entry point for running video generation jobs.
//!
//! [`JobController`] owns the shared [`JobStore`], the submitter and the
//! single [`StatusPoller`]. Callers drive it through [`submit`],
//! [`refresh`] and [`cancel`], and observe progress through
//! [`subscribe`] (state) or [`subscribe_events`] (lifecycle events).
//!
//! At most one poll task runs at any time. Every new submission and
//! every cancellation supersedes outstanding work; results arriving for a
//! superseded job are discarded by the store.
//!
//! [`submit`]: JobController::submit
//! [`refresh`]: JobController::refresh
//! [`cancel`]: JobController::cancel
//! [`subscribe`]: JobController::subscribe
//! [`subscribe_events`]: JobController::subscribe_events

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use vidgen_core::error::CoreError;
use vidgen_core::job::JobHandle;
use vidgen_core::request::JobRequest;
use vidgen_core::simulation::DemoFallbackSimulator;
use vidgen_core::state::JobState;

use crate::api::InferenceApi;
use crate::config::InferenceConfig;
use crate::events::JobEvent;
use crate::poller::{poll_tick, StatusPoller, TickResult};
use crate::source::JobSource;
use crate::store::{Cancelled, JobStore};
use crate::submitter::{JobSubmitter, Submission};
use crate::transport::{HttpTransport, Transport};

pub struct JobController {
    store: Arc<JobStore>,
    api: Arc<InferenceApi>,
    submitter: JobSubmitter,
    simulator: DemoFallbackSimulator,
    /// Also serialises "attach handle + start polling" so a superseded
    /// submission can never replace a newer job's poll task.
    poller: Mutex<StatusPoller>,
}

impl JobController {
    pub fn new(transport: Arc<dyn Transport>, config: &InferenceConfig) -> Self {
        let api = Arc::new(InferenceApi::new(transport, config));
        Self {
            store: Arc::new(JobStore::new()),
            submitter: JobSubmitter::new(Arc::clone(&api), config.fallback_policy),
            api,
            simulator: DemoFallbackSimulator::new(config.simulation_duration),
            poller: Mutex::new(StatusPoller::new(config.poller_config())),
        }
    }

    /// Controller backed by the reqwest transport.
    pub fn with_http(config: &InferenceConfig) -> Self {
        Self::new(Arc::new(HttpTransport::new()), config)
    }

    /// Receive the current [`JobState`] and every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.store.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<JobEvent> {
        self.store.subscribe_events()
    }

    pub fn state(&self) -> JobState {
        self.store.snapshot()
    }

    pub async fn current_handle(&self) -> Option<JobHandle> {
        self.store.current_handle().await
    }

    pub async fn is_polling(&self) -> bool {
        self.poller.lock().await.is_running()
    }

    /// Submit a new job, superseding whatever ran before.
    ///
    /// Returns once the job is being polled or has failed to submit; the
    /// outcome is reported through the state channel. Only an invalid
    /// request is returned as an error, and in that case the state is
    /// left untouched.
    pub async fn submit(&self, request: JobRequest) -> Result<(), CoreError> {
        request.validate()?;

        let generation = self.store.begin_submission().await;
        self.poller.lock().await.stop();

        let kind = request.kind();
        tracing::info!(kind = kind.as_str(), generation, "Submitting job");

        match self.submitter.submit(&request).await {
            Ok(submission) => self.launch(generation, submission).await,
            Err(error) => {
                if !self
                    .store
                    .fail_submission(generation, error.to_error_info())
                    .await
                {
                    tracing::debug!(generation, "Superseded submission failed, ignoring");
                }
            }
        }
        Ok(())
    }

    async fn launch(&self, generation: u64, submission: Submission) {
        let mut poller = self.poller.lock().await;

        let Submission {
            handle,
            initial_eta_secs,
            fallback_cause,
        } = submission;

        let attached = self
            .store
            .attach(
                generation,
                handle.clone(),
                initial_eta_secs,
                fallback_cause.map(|cause| cause.to_string()),
            )
            .await;
        let Some(lease) = attached else {
            if self.store.park(generation, handle.clone(), initial_eta_secs).await {
                tracing::info!(
                    job_id = %handle.id(),
                    "Submission answered after cancel; job recorded without polling",
                );
            } else {
                tracing::debug!(generation, "Submission superseded before it was accepted");
            }
            return;
        };

        let source = JobSource::for_handle(lease.handle(), &self.api, self.simulator);
        poller.start(source, lease, Arc::clone(&self.store));
    }

    /// Check the current job once, right now.
    ///
    /// Does nothing while the poller is running, when no job exists, or
    /// when the job already finished. A failed check is logged and left
    /// for the next call.
    pub async fn refresh(&self) {
        if self.poller.lock().await.is_running() {
            tracing::debug!("Refresh skipped, poller is running");
            return;
        }
        if self.store.snapshot().phase().is_terminal() {
            return;
        }
        let Some(lease) = self.store.lease().await else {
            return;
        };

        tracing::info!(job_id = %lease.handle().id(), "Manual status refresh");
        let source = JobSource::for_handle(lease.handle(), &self.api, self.simulator);
        let mut failures = 0;
        if poll_tick(&source, &lease, &self.store, &mut failures, 0).await == TickResult::Superseded
        {
            tracing::debug!(job_id = %lease.handle().id(), "Refresh result discarded");
        }
    }

    /// Stop polling. The state keeps its last value; in-flight poll
    /// responses are discarded.
    ///
    /// A submission still awaiting its response is not aborted: once it
    /// is answered, the job is recorded (`Polling` with a handle, or
    /// `Failed`) but not polled until [`refresh`](Self::refresh).
    pub async fn cancel(&self) {
        let cancelled = self.store.cancel().await;
        self.poller.lock().await.stop();

        match cancelled {
            Cancelled::Job(job_id) => tracing::info!(job_id = %job_id, "Job cancelled"),
            Cancelled::Submission => tracing::info!("Pending submission cancelled"),
            Cancelled::Nothing => {}
        }
    }
}
