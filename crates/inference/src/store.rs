//! The single shared job record and the identity of the current job.
//!
//! [`JobStore`] owns the observable [`JobState`] (published through a
//! [`watch`] channel) and the current [`JobHandle`]. Every write that
//! originates from asynchronous work (a submission response, a poll
//! tick) goes through a [`Lease`]: the write is applied only if the
//! lease's generation is still the store's current one, checked under
//! the same lock as the write. A new submission or a cancellation bumps
//! the generation, so late responses for a superseded job are dropped.
//!
//! Lifecycle events are published while the lock is held, so observers
//! see events in the same order as the state changes they describe.

use tokio::sync::{broadcast, watch, Mutex};
use vidgen_core::job::JobHandle;
use vidgen_core::state::{ErrorInfo, JobPhase, JobState};

use crate::events::{JobEvent, EVENT_CHANNEL_CAPACITY};

/// Permission to update the state on behalf of one job.
#[derive(Debug, Clone)]
pub struct Lease {
    generation: u64,
    handle: JobHandle,
}

impl Lease {
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }
}

/// What [`JobStore::cancel`] interrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cancelled {
    /// No job and no submission in flight.
    Nothing,
    /// A submission that has not been answered yet.
    Submission,
    Job(String),
}

#[derive(Default)]
struct Active {
    generation: u64,
    handle: Option<JobHandle>,
    /// Generation of a submission cancelled before it was answered. Its
    /// outcome is still recorded (without polling) unless a newer
    /// submission has started.
    cancelled_submission: Option<u64>,
}

impl Active {
    fn is_cancelled_submission(&self, generation: u64) -> bool {
        self.cancelled_submission == Some(generation)
    }
}

pub struct JobStore {
    state: watch::Sender<JobState>,
    events: broadcast::Sender<JobEvent>,
    active: Mutex<Active>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(JobState::idle());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state,
            events,
            active: Mutex::new(Active::default()),
        }
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> JobState {
        self.state.borrow().clone()
    }

    pub async fn current_handle(&self) -> Option<JobHandle> {
        self.active.lock().await.handle.clone()
    }

    /// Dropped silently when nobody listens.
    fn publish(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }

    /// Start a new submission: supersede the current job, drop its handle
    /// and move to `Submitting`. Returns the new generation.
    pub async fn begin_submission(&self) -> u64 {
        let mut active = self.active.lock().await;
        active.generation += 1;
        active.handle = None;
        active.cancelled_submission = None;
        self.state.send_modify(JobState::begin_submission);
        active.generation
    }

    /// Install the submitted handle, move to `Polling` and announce the
    /// job (preceded by the fallback cause, if any).
    ///
    /// Returns `None` if the submission was superseded or cancelled in
    /// the meantime.
    pub async fn attach(
        &self,
        generation: u64,
        handle: JobHandle,
        initial_eta_secs: f64,
        fallback_cause: Option<String>,
    ) -> Option<Lease> {
        let mut active = self.active.lock().await;
        if active.generation != generation {
            return None;
        }
        active.handle = Some(handle.clone());
        self.state
            .send_modify(|state| state.begin_polling(initial_eta_secs));

        if let Some(cause) = fallback_cause {
            self.publish(JobEvent::FellBackToSimulation {
                job_id: handle.id().to_string(),
                cause,
            });
        }
        self.publish(JobEvent::Submitted {
            job_id: handle.id().to_string(),
            kind: handle.kind(),
            simulated: handle.is_simulated(),
        });
        Some(Lease { generation, handle })
    }

    /// Record the handle of a submission that was cancelled while in
    /// flight. The state moves to `Polling` but nothing polls it until
    /// the next refresh. Returns `false` if a newer submission exists.
    pub async fn park(&self, generation: u64, handle: JobHandle, initial_eta_secs: f64) -> bool {
        let mut active = self.active.lock().await;
        if !active.is_cancelled_submission(generation) {
            return false;
        }
        active.cancelled_submission = None;
        active.handle = Some(handle);
        self.state
            .send_modify(|state| state.begin_polling(initial_eta_secs));
        true
    }

    /// Record a failed submission and publish `Failed`. Returns `false`
    /// if superseded.
    ///
    /// A submission cancelled while in flight still records its failure.
    pub async fn fail_submission(&self, generation: u64, error: ErrorInfo) -> bool {
        let mut active = self.active.lock().await;
        if active.generation != generation && !active.is_cancelled_submission(generation) {
            return false;
        }
        active.cancelled_submission = None;
        self.state.send_modify(|state| state.fail(error.clone()));
        self.publish(JobEvent::Failed {
            job_id: None,
            error,
        });
        true
    }

    /// A fresh lease on the current handle, if there is one.
    pub async fn lease(&self) -> Option<Lease> {
        let active = self.active.lock().await;
        active.handle.clone().map(|handle| Lease {
            generation: active.generation,
            handle,
        })
    }

    /// Invalidate all outstanding leases and publish `Cancelled`. The
    /// handle and state are kept.
    pub async fn cancel(&self) -> Cancelled {
        let mut active = self.active.lock().await;
        let pending = active.handle.is_none() && self.state.borrow().phase() == JobPhase::Submitting;
        if pending {
            active.cancelled_submission = Some(active.generation);
        }
        active.generation += 1;

        let cancelled = match (&active.handle, pending) {
            (Some(handle), _) => Cancelled::Job(handle.id().to_string()),
            (None, true) => Cancelled::Submission,
            (None, false) => Cancelled::Nothing,
        };
        match &cancelled {
            Cancelled::Job(job_id) => self.publish(JobEvent::Cancelled {
                job_id: Some(job_id.clone()),
            }),
            Cancelled::Submission => self.publish(JobEvent::Cancelled { job_id: None }),
            Cancelled::Nothing => {}
        }
        cancelled
    }

    /// Apply `update` if `lease` is still current, publishing the event it
    /// returns. Returns whether the lease was current.
    pub async fn apply(
        &self,
        lease: &Lease,
        update: impl FnOnce(&mut JobState) -> Option<JobEvent>,
    ) -> bool {
        let active = self.active.lock().await;
        if active.generation != lease.generation {
            return false;
        }
        let mut event = None;
        self.state.send_modify(|state| event = update(state));
        if let Some(event) = event {
            self.publish(event);
        }
        true
    }
}
