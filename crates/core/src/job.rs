//! Job identity.
//!
//! A [`JobHandle`] names one in-flight job. Handles are created once per
//! submission and never mutated afterwards; a new submission replaces the
//! handle wholesale.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::types::Timestamp;

/// Initial ETA for text jobs when the service does not provide one.
pub const DEFAULT_TEXT_ETA_SECS: f64 = 30.0;

/// Initial ETA for image jobs when the service does not provide one.
pub const DEFAULT_IMAGE_ETA_SECS: f64 = 45.0;

/// Prefix applied to ids of locally simulated jobs.
pub const SIMULATED_ID_PREFIX: &str = "sim-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Text,
    Image,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Fallback ETA used when the service omits one, and for simulated jobs.
    pub fn default_eta_secs(self) -> f64 {
        match self {
            Self::Text => DEFAULT_TEXT_ETA_SECS,
            Self::Image => DEFAULT_IMAGE_ETA_SECS,
        }
    }
}

/// Where a job's status comes from. Fixed for the lifetime of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOrigin {
    /// Tracked by polling the remote service.
    Remote,
    /// Progress and result are computed locally.
    Simulated,
}

/// Identifies one in-flight job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: String,
    kind: JobKind,
    created_at: Timestamp,
    started: Instant,
    origin: JobOrigin,
}

impl JobHandle {
    /// A job accepted by the remote service under `id`.
    pub fn remote(id: impl Into<String>, kind: JobKind) -> Self {
        Self::new(id.into(), kind, JobOrigin::Remote)
    }

    /// A locally simulated job with a fresh `sim-<uuid>` id.
    pub fn simulated(kind: JobKind) -> Self {
        let id = format!("{SIMULATED_ID_PREFIX}{}", uuid::Uuid::new_v4());
        Self::new(id, kind, JobOrigin::Simulated)
    }

    fn new(id: String, kind: JobKind, origin: JobOrigin) -> Self {
        Self {
            id,
            kind,
            created_at: chrono::Utc::now(),
            started: Instant::now(),
            origin,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Wall-clock creation time, for display.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Monotonic creation instant, used for elapsed-time calculations.
    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn origin(&self) -> JobOrigin {
        self.origin
    }

    pub fn is_simulated(&self) -> bool {
        self.origin == JobOrigin::Simulated
    }

    /// Time elapsed between creation and `now` (zero if `now` is earlier).
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}
