//! Wire types for the generation service.
//!
//! Submission bodies are serialized from borrowed request data; status
//! responses are deserialized leniently (missing fields default, a few
//! status synonyms are accepted) since the poller has to cope with
//! partially populated payloads.

use serde::{Deserialize, Serialize};
use vidgen_core::request::{Resolution, Seed};

/// JSON body of a text-to-video submission.
#[derive(Debug, Serialize)]
pub struct TextSubmitPayload<'a> {
    pub prompt: &'a str,
    pub resolution: Resolution,
    pub watermark: bool,
    pub seed: Seed,
}

/// The JSON-encoded `parameters` part of an image-to-video submission.
#[derive(Debug, Serialize)]
pub struct ImageParameters {
    pub watermark: bool,
    pub seed: Seed,
}

/// Body returned by both submission endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, alias = "id")]
    pub job_id: Option<String>,
    /// Service estimate in seconds.
    #[serde(default)]
    pub eta: Option<f64>,
}

/// Discriminator of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    #[serde(alias = "queued", alias = "pending", alias = "running")]
    Processing,
    #[serde(alias = "succeeded", alias = "success")]
    Completed,
    #[serde(alias = "failed")]
    Error,
}

/// Where the finished video can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OutputRef {
    /// Absolute URL or a path relative to the API base URL.
    Location(String),
    Object {
        #[serde(alias = "url")]
        video_url: String,
    },
}

impl OutputRef {
    pub fn location(&self) -> &str {
        match self {
            Self::Location(s) => s,
            Self::Object { video_url } => video_url,
        }
    }
}

/// Body returned by the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: RemoteStatus,
    /// Percentage, `0..=100`.
    #[serde(default)]
    pub progress: Option<f64>,
    /// Seconds remaining.
    #[serde(default)]
    pub eta: Option<f64>,
    #[serde(default)]
    pub output: Option<OutputRef>,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

pub fn parse_submit_response(body: &str) -> Result<SubmitResponse, serde_json::Error> {
    serde_json::from_str(body)
}

pub fn parse_status_response(body: &str) -> Result<StatusResponse, serde_json::Error> {
    serde_json::from_str(body)
}
