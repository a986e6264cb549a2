//! Lifecycle events emitted by the job controller.
//!
//! These complement the [`JobState`](vidgen_core::state::JobState) watch
//! channel: the state tells a view what to render, the events tell a
//! notification layer what just happened.

use serde::Serialize;
use vidgen_core::job::JobKind;
use vidgen_core::state::ErrorInfo;

/// Broadcast channel capacity for lifecycle events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A handle exists and polling has started.
    Submitted {
        job_id: String,
        kind: JobKind,
        simulated: bool,
    },

    /// Submission failed and a simulated job took its place.
    FellBackToSimulation { job_id: String, cause: String },

    /// A poll tick moved the job forward.
    Progress {
        job_id: String,
        /// Completion percentage (0-100).
        progress: f64,
        eta_secs: f64,
    },

    Completed { job_id: String, result_url: String },

    /// `job_id` is `None` when submission itself failed.
    Failed {
        job_id: Option<String>,
        error: ErrorInfo,
    },

    /// Polling was stopped by the caller. `job_id` is `None` when the
    /// submission had not been answered yet.
    Cancelled { job_id: Option<String> },
}
