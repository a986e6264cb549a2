//! The observable job state record.
//!
//! [`JobState`] keeps its fields private so that every transition goes
//! through a method that upholds the phase invariants:
//!
//! - `result_url` is set if and only if the phase is `Succeeded`;
//! - `error` is set if and only if the phase is `Failed`.

use serde::Serialize;

/// Lifecycle phase of the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Succeeded,
    Failed,
}

impl JobPhase {
    /// `Succeeded` and `Failed` stay put until the next submission.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Classification of a user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Network,
    AuthFailed,
    RateLimited,
    ServerError,
    NoIdentifier,
    MalformedResponse,
    Internal,
}

/// A failure as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Snapshot of the current job, overwritten on every submission and tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JobState {
    phase: JobPhase,
    /// Completion percentage, `0..=100`.
    progress: f64,
    estimated_seconds_remaining: f64,
    result_url: Option<String>,
    error: Option<ErrorInfo>,
}

impl JobState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn estimated_seconds_remaining(&self) -> f64 {
        self.estimated_seconds_remaining
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Reset for a new submission.
    pub fn begin_submission(&mut self) {
        *self = Self {
            phase: JobPhase::Submitting,
            ..Self::default()
        };
    }

    /// A handle exists; start tracking it with the given initial ETA.
    pub fn begin_polling(&mut self, eta_secs: f64) {
        *self = Self {
            phase: JobPhase::Polling,
            estimated_seconds_remaining: sanitize_eta(eta_secs),
            ..Self::default()
        };
    }

    /// Record a progress update. Ignored outside `Polling`.
    ///
    /// Non-finite values leave the previous reading in place.
    pub fn record_progress(&mut self, progress: f64, eta_secs: f64) {
        if self.phase != JobPhase::Polling {
            return;
        }
        if progress.is_finite() {
            self.progress = progress.clamp(0.0, 100.0);
        }
        if eta_secs.is_finite() {
            self.estimated_seconds_remaining = eta_secs.max(0.0);
        }
    }

    /// Terminal success with the playable result URL.
    pub fn succeed(&mut self, result_url: impl Into<String>) {
        *self = Self {
            phase: JobPhase::Succeeded,
            progress: 100.0,
            estimated_seconds_remaining: 0.0,
            result_url: Some(result_url.into()),
            error: None,
        };
    }

    /// Terminal failure. Progress is kept as last observed.
    pub fn fail(&mut self, error: ErrorInfo) {
        self.phase = JobPhase::Failed;
        self.estimated_seconds_remaining = 0.0;
        self.result_url = None;
        self.error = Some(error);
    }

    /// Whether the phase/result/error invariants hold.
    pub fn is_consistent(&self) -> bool {
        let succeeded = self.phase == JobPhase::Succeeded;
        let failed = self.phase == JobPhase::Failed;
        succeeded == self.result_url.is_some()
            && failed == self.error.is_some()
            && (0.0..=100.0).contains(&self.progress)
            && self.estimated_seconds_remaining >= 0.0
    }
}

fn sanitize_eta(eta_secs: f64) -> f64 {
    if eta_secs.is_finite() {
        eta_secs.max(0.0)
    } else {
        0.0
    }
}
