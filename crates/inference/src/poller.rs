//! Repeating status checks for the current job.
//!
//! [`StatusPoller`] owns at most one polling task at a time. Starting a
//! new job stops the previous task first, and every task is tied to a
//! [`CancellationToken`] so [`StatusPoller::stop`] (or dropping the
//! poller) guarantees no further ticks are scheduled. A tick that is
//! awaiting a response when the token fires is abandoned; one that has
//! already finished but belongs to a superseded job is rejected by the
//! store's lease check.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::events::JobEvent;
use crate::source::{JobSource, PollOutcome};
use crate::store::{JobStore, Lease};

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of consecutive failed checks tolerated before a job
/// is failed.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Shortest accepted interval; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// `0` disables the limit.
    pub max_consecutive_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// Keep polling.
    Continue,
    /// The job reached `Succeeded` or `Failed`.
    Finished,
    /// The lease is no longer current; nothing was written.
    Superseded,
}

/// Bookkeeping for the running task.
struct PollTask {
    job_id: String,
    cancel: CancellationToken,
    task_handle: JoinHandle<()>,
}

pub struct StatusPoller {
    config: PollerConfig,
    running: Option<PollTask>,
}

impl StatusPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config: PollerConfig {
                interval: config.interval.max(MIN_POLL_INTERVAL),
                ..config
            },
            running: None,
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Start polling `lease`'s job, stopping any task already running.
    ///
    /// The first check happens one interval after this call.
    pub fn start(&mut self, source: JobSource, lease: Lease, store: Arc<JobStore>) {
        self.stop();

        let cancel = CancellationToken::new();
        let job_id = lease.handle().id().to_string();
        let config = self.config;
        let task_cancel = cancel.clone();

        tracing::info!(
            job_id = %job_id,
            simulated = source.is_simulated(),
            interval_ms = config.interval.as_millis() as u64,
            "Status poller started",
        );

        let task_handle = tokio::spawn(async move {
            run_poll_loop(&source, &lease, &store, config, &task_cancel).await;
            tracing::debug!(job_id = %lease.handle().id(), "Status poller task exited");
        });

        self.running = Some(PollTask {
            job_id,
            cancel,
            task_handle,
        });
    }

    /// Stop the running task, if any. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.running.take() {
            task.cancel.cancel();
            tracing::info!(job_id = %task.job_id, "Status poller stopped");
        }
    }

    /// Whether a task is alive. A task that ended on its own (terminal
    /// state, superseded lease) counts as not running.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|task| !task.cancel.is_cancelled() && !task.task_handle.is_finished())
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick every `config.interval` until the job ends, the lease goes
/// stale, or `cancel` fires.
async fn run_poll_loop(
    source: &JobSource,
    lease: &Lease,
    store: &JobStore,
    config: PollerConfig,
    cancel: &CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = poll_tick(source, lease, store, &mut failures, config.max_consecutive_failures) => result,
        };

        match result {
            TickResult::Continue => {}
            TickResult::Finished => return,
            TickResult::Superseded => {
                tracing::debug!(job_id = %lease.handle().id(), "Lease superseded, poller exiting");
                return;
            }
        }
    }
}

/// Check the job once and apply the outcome to the store.
///
/// Transient failures (network blips, timeouts, 5xx, unparseable
/// bodies) are logged and skipped; `failures` counts them and the job is
/// failed once `max_failures` consecutive checks have failed (`0`
/// disables the limit). Any successful check resets the counter.
pub async fn poll_tick(
    source: &JobSource,
    lease: &Lease,
    store: &JobStore,
    failures: &mut u32,
    max_failures: u32,
) -> TickResult {
    let job_id = lease.handle().id().to_string();

    match source.poll(lease.handle()).await {
        Ok(PollOutcome::Progress { progress, eta_secs }) => {
            *failures = 0;
            let applied = store
                .apply(lease, |state| {
                    let progress = progress.unwrap_or(state.progress());
                    let eta_secs = eta_secs.unwrap_or(state.estimated_seconds_remaining());
                    state.record_progress(progress, eta_secs);
                    tracing::debug!(
                        job_id = %job_id,
                        progress = state.progress(),
                        eta_secs = state.estimated_seconds_remaining(),
                        "Poll tick",
                    );
                    Some(JobEvent::Progress {
                        job_id: job_id.clone(),
                        progress: state.progress(),
                        eta_secs: state.estimated_seconds_remaining(),
                    })
                })
                .await;
            if applied {
                TickResult::Continue
            } else {
                TickResult::Superseded
            }
        }
        Ok(PollOutcome::Completed { result_url }) => {
            let applied = store
                .apply(lease, |state| {
                    state.succeed(result_url.as_str());
                    Some(JobEvent::Completed {
                        job_id: job_id.clone(),
                        result_url: result_url.clone(),
                    })
                })
                .await;
            if !applied {
                return TickResult::Superseded;
            }
            tracing::info!(job_id = %job_id, result_url = %result_url, "Job completed");
            TickResult::Finished
        }
        Ok(PollOutcome::Failed(error)) => fail_job(store, lease, job_id, &error).await,
        Err(error) if error.is_transient() => {
            *failures += 1;
            tracing::warn!(
                job_id = %job_id,
                error = %error,
                consecutive_failures = *failures,
                "Status check failed, retrying on next tick",
            );
            if max_failures > 0 && *failures >= max_failures {
                fail_job(store, lease, job_id, &error).await
            } else {
                TickResult::Continue
            }
        }
        Err(error) => fail_job(store, lease, job_id, &error).await,
    }
}

async fn fail_job(
    store: &JobStore,
    lease: &Lease,
    job_id: String,
    error: &JobError,
) -> TickResult {
    let info = error.to_error_info();
    let applied = store
        .apply(lease, |state| {
            state.fail(info.clone());
            Some(JobEvent::Failed {
                job_id: Some(job_id.clone()),
                error: info,
            })
        })
        .await;
    if !applied {
        return TickResult::Superseded;
    }
    tracing::error!(job_id = %job_id, error = %error, "Job failed");
    TickResult::Finished
}
