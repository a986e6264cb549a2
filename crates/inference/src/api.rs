//! REST API client for the generation service.
//!
//! Wraps the three endpoints (text submission, image submission, job
//! status) on top of a [`Transport`], turning HTTP-level outcomes into
//! [`JobError`]s.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use vidgen_core::request::{ImageJobRequest, TextJobRequest};

use crate::config::InferenceConfig;
use crate::error::{ApiError, JobError, TransportError};
use crate::messages::{
    parse_status_response, parse_submit_response, ImageParameters, OutputRef, StatusResponse,
    TextSubmitPayload,
};
use crate::transport::{MultipartPart, RequestSpec, Transport, TransportResponse};

/// Path of the text-to-video endpoint, relative to the base URL.
pub const TEXT_TO_VIDEO_PATH: &[&str] = &["v1", "text-to-video"];

/// Path of the image-to-video endpoint, relative to the base URL.
pub const IMAGE_TO_VIDEO_PATH: &[&str] = &["v1", "image-to-video"];

/// Prefix of the status endpoint; the job id is appended as a segment.
pub const JOBS_PATH: &[&str] = &["v1", "jobs"];

/// A job the service has accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    /// Server-assigned job identifier.
    pub job_id: String,
    /// Initial estimate in seconds, when the service provides one.
    pub eta_secs: Option<f64>,
}

/// HTTP client for one generation service.
pub struct InferenceApi {
    transport: Arc<dyn Transport>,
    base_url: Url,
    api_key: Option<String>,
    submit_timeout: Duration,
    status_timeout: Duration,
}

impl InferenceApi {
    pub fn new(transport: Arc<dyn Transport>, config: &InferenceConfig) -> Self {
        Self {
            transport,
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            submit_timeout: config.submit_timeout,
            status_timeout: config.status_timeout,
        }
    }

    /// Submit a text-driven job.
    ///
    /// Sends `POST v1/text-to-video` with a JSON body of prompt,
    /// resolution, watermark and seed.
    pub async fn submit_text(&self, request: &TextJobRequest) -> Result<Accepted, JobError> {
        let payload = TextSubmitPayload {
            prompt: &request.prompt,
            resolution: request.resolution,
            watermark: request.watermark,
            seed: request.seed,
        };
        let body = serde_json::to_value(&payload)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let spec = RequestSpec::post(self.endpoint(TEXT_TO_VIDEO_PATH, None)?, self.submit_timeout)
            .json(body);

        let response = self.send(spec).await?;
        Self::parse_accepted(&response)
    }

    /// Submit an image-driven job.
    ///
    /// Sends `POST v1/image-to-video` as multipart: an optional `prompt`
    /// field, a JSON `parameters` field, and one `images` file part per
    /// image, in order.
    pub async fn submit_image(&self, request: &ImageJobRequest) -> Result<Accepted, JobError> {
        let parameters = serde_json::to_value(ImageParameters {
            watermark: request.watermark,
            seed: request.seed,
        })
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut parts = Vec::with_capacity(request.images.len() + 2);
        if let Some(prompt) = &request.prompt {
            parts.push(MultipartPart::text("prompt", prompt.as_str()));
        }
        parts.push(MultipartPart::json("parameters", &parameters));
        for image in &request.images {
            parts.push(MultipartPart::file(
                "images",
                image.file_name.as_str(),
                image.mime.as_str(),
                image.bytes.clone(),
            ));
        }

        let spec = RequestSpec::post(self.endpoint(IMAGE_TO_VIDEO_PATH, None)?, self.submit_timeout)
            .multipart(parts);

        let response = self.send(spec).await?;
        Self::parse_accepted(&response)
    }

    /// Fetch the current status of a job via `GET v1/jobs/{job_id}`.
    pub async fn job_status(&self, job_id: &str) -> Result<StatusResponse, JobError> {
        let spec = RequestSpec::get(self.endpoint(JOBS_PATH, Some(job_id))?, self.status_timeout);
        let response = self.send(spec).await?;
        parse_status_response(&response.body)
            .map_err(|e| JobError::MalformedResponse(format!("status body: {e}")))
    }

    /// Turn an output reference into a playable URL.
    ///
    /// Absolute URLs are returned unchanged; anything else is resolved
    /// against the base URL.
    pub fn resolve_output(&self, output: &OutputRef) -> Result<String, JobError> {
        let location = output.location().trim();
        if location.is_empty() {
            return Err(JobError::MalformedResponse(
                "completed job has an empty output reference".to_string(),
            ));
        }
        if let Ok(absolute) = Url::parse(location) {
            return Ok(absolute.to_string());
        }
        self.base_url
            .join(location.trim_start_matches('/'))
            .map(|url| url.to_string())
            .map_err(|e| JobError::MalformedResponse(format!("output reference '{location}': {e}")))
    }

    // ---- private helpers ----

    /// Build an endpoint URL from path segments (percent-encoded) and an
    /// optional trailing id segment.
    fn endpoint(&self, segments: &[&str], id: Option<&str>) -> Result<String, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                TransportError::InvalidRequest(format!(
                    "base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?;
            path.pop_if_empty().extend(segments);
            if let Some(id) = id {
                path.push(id);
            }
        }
        Ok(url.to_string())
    }

    /// Attach credentials, send, and fail on non-2xx statuses.
    async fn send(&self, mut spec: RequestSpec) -> Result<TransportResponse, JobError> {
        if let Some(key) = &self.api_key {
            spec = spec.header("Authorization", format!("Bearer {key}"));
        }
        let response = self.transport.request(spec).await?;
        Self::ensure_success(response)
    }

    fn ensure_success(response: TransportResponse) -> Result<TransportResponse, JobError> {
        match ApiError::from_status(response.status, &response.body) {
            Some(error) => Err(error.into()),
            None => Ok(response),
        }
    }

    fn parse_accepted(response: &TransportResponse) -> Result<Accepted, JobError> {
        let parsed = parse_submit_response(&response.body)
            .map_err(|e| JobError::MalformedResponse(format!("submission body: {e}")))?;

        let job_id = parsed
            .job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(JobError::NoIdentifier)?;

        Ok(Accepted {
            job_id,
            eta_secs: parsed.eta.filter(|eta| eta.is_finite() && *eta >= 0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::transport::HttpTransport;

    fn api(base: &str) -> InferenceApi {
        let config = InferenceConfig {
            api_url: Url::parse(base).unwrap(),
            ..Default::default()
        };
        InferenceApi::new(Arc::new(HttpTransport::new()), &config)
    }

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        let api = api("https://gen.example.com/api/");
        assert_eq!(
            api.endpoint(TEXT_TO_VIDEO_PATH, None).unwrap(),
            "https://gen.example.com/api/v1/text-to-video"
        );
    }

    #[test]
    fn endpoint_percent_encodes_job_id() {
        let api = api("http://localhost:8000/");
        assert_eq!(
            api.endpoint(JOBS_PATH, Some("a/b c")).unwrap(),
            "http://localhost:8000/v1/jobs/a%2Fb%20c"
        );
    }

    #[test]
    fn absolute_output_is_kept() {
        let api = api("http://localhost:8000/");
        let url = api
            .resolve_output(&OutputRef::Location("https://cdn.example.com/v.mp4".into()))
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/v.mp4");
    }

    #[test]
    fn relative_output_is_joined_onto_base() {
        let api = api("http://localhost:8000/api/");
        let url = api
            .resolve_output(&OutputRef::Object {
                video_url: "/outputs/job-1.mp4".into(),
            })
            .unwrap();
        assert_eq!(url, "http://localhost:8000/api/outputs/job-1.mp4");
    }

    #[test]
    fn empty_output_is_malformed() {
        let api = api("http://localhost:8000/");
        assert_matches!(
            api.resolve_output(&OutputRef::Location("  ".into())),
            Err(JobError::MalformedResponse(_))
        );
    }

    #[test]
    fn accepted_requires_non_blank_id() {
        let ok = InferenceApi::parse_accepted(&TransportResponse::new(200, r#"{"job_id":"j1"}"#));
        assert_matches!(ok, Ok(Accepted { job_id, eta_secs: None }) if job_id == "j1");

        let blank = InferenceApi::parse_accepted(&TransportResponse::new(200, r#"{"job_id":" "}"#));
        assert_matches!(blank, Err(JobError::NoIdentifier));

        let garbage = InferenceApi::parse_accepted(&TransportResponse::new(200, "<html>"));
        assert_matches!(garbage, Err(JobError::MalformedResponse(_)));
    }

    #[test]
    fn negative_eta_is_dropped() {
        let accepted =
            InferenceApi::parse_accepted(&TransportResponse::new(200, r#"{"id":"j","eta":-4}"#))
                .unwrap();
        assert_eq!(accepted.eta_secs, None);
    }
}
