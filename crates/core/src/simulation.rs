//! Deterministic stand-in for the remote service.
//!
//! Used when a job could not be submitted for real (or when demo mode
//! is on). Progress is a pure function of the time elapsed since the
//! handle was created, so polling the same job twice at the same instant
//! always yields the same reading, and the result URL is chosen by
//! hashing the job id rather than by call count.

use std::time::Duration;

use tokio::time::Instant;

use crate::hashing::stable_index;
use crate::job::JobHandle;

/// How long a simulated job takes to reach 100%.
pub const DEFAULT_SIMULATION_DURATION: Duration = Duration::from_secs(20);

/// Sample videos handed out as simulated results.
pub const SAMPLE_VIDEO_URLS: [&str; 4] = [
    "https://storage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4",
    "https://storage.googleapis.com/gtv-videos-bucket/sample/ElephantsDream.mp4",
    "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4",
    "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerFun.mp4",
];

/// One simulated status reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedStatus {
    pub progress: f64,
    pub estimated_seconds_remaining: f64,
    /// Present once progress reaches 100.
    pub result_url: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct DemoFallbackSimulator {
    duration: Duration,
}

impl Default for DemoFallbackSimulator {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATION_DURATION)
    }
}

impl DemoFallbackSimulator {
    /// A zero `duration` completes jobs immediately.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// `min(100, elapsed / duration * 100)`.
    pub fn progress_at(&self, handle: &JobHandle, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 100.0;
        }
        let elapsed = handle.elapsed_at(now).as_secs_f64();
        (elapsed / self.duration.as_secs_f64() * 100.0).min(100.0)
    }

    /// `duration * (1 - progress / 100)`, in seconds.
    pub fn estimated_seconds_remaining_at(&self, handle: &JobHandle, now: Instant) -> f64 {
        let progress = self.progress_at(handle, now);
        self.duration.as_secs_f64() * (1.0 - progress / 100.0)
    }

    /// The sample video assigned to `handle`. Stable across calls.
    pub fn result_for(&self, handle: &JobHandle) -> &'static str {
        SAMPLE_VIDEO_URLS[stable_index(handle.id().as_bytes(), SAMPLE_VIDEO_URLS.len())]
    }

    pub fn status_at(&self, handle: &JobHandle, now: Instant) -> SimulatedStatus {
        let progress = self.progress_at(handle, now);
        SimulatedStatus {
            progress,
            estimated_seconds_remaining: self.estimated_seconds_remaining_at(handle, now),
            result_url: (progress >= 100.0).then(|| self.result_for(handle)),
        }
    }
}
