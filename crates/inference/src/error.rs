//! Error classification for transport, API and job-level failures.

use std::time::Duration;

use vidgen_core::state::{ErrorInfo, ErrorKind};

/// Longest service message carried into an error verbatim.
const MAX_MESSAGE_CHARS: usize = 200;

/// A request that never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// Connection refused, DNS, TLS, reset, body read failure, etc.
    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be built (bad header, bad MIME type, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout { after: timeout }
        } else if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// The service answered, but with a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 401 or 403.
    #[error("Authentication failed ({status}): {message}")]
    AuthFailed { status: u16, message: String },

    /// HTTP 429.
    #[error("Rate limited by the service: {message}")]
    RateLimited { message: String },

    /// Any other non-2xx status, or `status = "error"` in a poll
    /// response (`status` is `None` in that case).
    #[error("{}", server_error_text(*status, message))]
    ServerError { status: Option<u16>, message: String },
}

fn server_error_text(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Service error ({code}): {message}"),
        None => message.to_string(),
    }
}

impl ApiError {
    /// Classify an HTTP response. Returns `None` for 2xx statuses.
    pub fn from_status(status: u16, body: &str) -> Option<Self> {
        if (200..300).contains(&status) {
            return None;
        }
        let message = extract_message(status, body);
        Some(match status {
            401 | 403 => Self::AuthFailed { status, message },
            429 => Self::RateLimited { message },
            _ => Self::ServerError {
                status: Some(status),
                message,
            },
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks for `error` (string or `{message}`), `message` and `detail`
/// in a JSON body, then falls back to the trimmed raw text.
fn extract_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.get("error").and_then(|e| e.as_str()),
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str()),
            value.get("message").and_then(|m| m.as_str()),
            value.get("detail").and_then(|d| d.as_str()),
        ];
        if let Some(found) = candidates.into_iter().flatten().find(|m| !m.is_empty()) {
            return truncate(found);
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        truncate(trimmed)
    }
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        message.to_string()
    } else {
        let cut: String = message.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{cut}...")
    }
}

/// Outcome of a failed submission or status check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// A 2xx submission response without a usable job id.
    #[error("Submission response did not include a job identifier")]
    NoIdentifier,

    #[error("Malformed response from the service: {0}")]
    MalformedResponse(String),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(TransportError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Transport(TransportError::Network(_)) => ErrorKind::Network,
            Self::Transport(TransportError::InvalidRequest(_)) => ErrorKind::Internal,
            Self::Api(ApiError::AuthFailed { .. }) => ErrorKind::AuthFailed,
            Self::Api(ApiError::RateLimited { .. }) => ErrorKind::RateLimited,
            Self::Api(ApiError::ServerError { .. }) => ErrorKind::ServerError,
            Self::NoIdentifier => ErrorKind::NoIdentifier,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Whether a failed status check should be skipped and retried on the
    /// next tick rather than ending the job.
    ///
    /// Authentication failures and explicit `status = "error"` responses
    /// are terminal; everything else is treated as a blip.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(TransportError::InvalidRequest(_)) => false,
            Self::Transport(_) => true,
            Self::Api(ApiError::AuthFailed { .. }) => false,
            Self::Api(ApiError::RateLimited { .. }) => true,
            Self::Api(ApiError::ServerError { status, .. }) => status.is_some(),
            Self::NoIdentifier => false,
            Self::MalformedResponse(_) => true,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.kind(), self.to_string())
    }
}
