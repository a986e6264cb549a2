//! Shared fixtures for `vidgen-inference` integration tests.
//!
//! [`ScriptedTransport`] stands in for the network: each route holds a
//! queue of replies (the last one repeats forever) and every request is
//! recorded so tests can assert on what was sent and how often.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vidgen_core::request::{JobRequest, Resolution, Seed, TextJobRequest};
use vidgen_inference::config::{FallbackPolicy, InferenceConfig};
use vidgen_inference::controller::JobController;
use vidgen_inference::error::TransportError;
use vidgen_inference::transport::{Method, RequestSpec, Transport, TransportResponse};

pub const BASE_URL: &str = "http://localhost:8000/";
pub const TEXT_URL: &str = "http://localhost:8000/v1/text-to-video";
pub const IMAGE_URL: &str = "http://localhost:8000/v1/image-to-video";

pub fn status_url(job_id: &str) -> String {
    format!("http://localhost:8000/v1/jobs/{job_id}")
}

/// What the fake does with one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(u16, String),
    Fail(TransportError),
    /// Wait (virtual time) before replying.
    After(Duration, Box<Reply>),
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Self::Respond(200, body.to_string())
    }

    pub fn status(code: u16, body: &str) -> Self {
        Self::Respond(code, body.to_string())
    }

    pub fn network() -> Self {
        Self::Fail(TransportError::Network("connection refused".to_string()))
    }

    pub fn after(delay: Duration, reply: Reply) -> Self {
        Self::After(delay, Box::new(reply))
    }
}

struct Route {
    method: Method,
    url: String,
    replies: VecDeque<Reply>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RequestSpec>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `replies` for `method url`. The last reply is repeated once
    /// the queue is exhausted.
    pub fn route(&self, method: Method, url: &str, replies: Vec<Reply>) {
        assert!(!replies.is_empty(), "a route needs at least one reply");
        self.routes.lock().unwrap().push(Route {
            method,
            url: url.to_string(),
            replies: replies.into(),
        });
    }

    pub fn requests(&self) -> Vec<RequestSpec> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    fn next_reply(&self, spec: &RequestSpec) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == spec.method && r.url == spec.url)
        else {
            return Reply::network();
        };
        if route.replies.len() > 1 {
            route.replies.pop_front().unwrap()
        } else {
            route.replies.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, spec: RequestSpec) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(spec.clone());
        let mut reply = self.next_reply(&spec);
        loop {
            match reply {
                Reply::Respond(status, body) => return Ok(TransportResponse::new(status, body)),
                Reply::Fail(error) => return Err(error),
                Reply::After(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

pub fn config(policy: FallbackPolicy) -> InferenceConfig {
    InferenceConfig {
        api_url: BASE_URL.parse().unwrap(),
        fallback_policy: policy,
        ..InferenceConfig::default()
    }
}

pub fn controller(transport: &Arc<ScriptedTransport>, config: &InferenceConfig) -> JobController {
    JobController::new(transport.clone(), config)
}

pub fn text_request(prompt: &str) -> JobRequest {
    JobRequest::Text(TextJobRequest {
        prompt: prompt.to_string(),
        resolution: Resolution::Landscape720,
        watermark: true,
        seed: Seed::Auto,
    })
}

pub fn accepted(job_id: &str) -> Reply {
    Reply::ok(&format!(r#"{{"job_id":"{job_id}","eta":30}}"#))
}

pub fn processing(progress: f64, eta: f64) -> Reply {
    Reply::ok(&format!(
        r#"{{"status":"processing","progress":{progress},"eta":{eta}}}"#
    ))
}

pub fn completed(url: &str) -> Reply {
    Reply::ok(&format!(r#"{{"status":"completed","output":"{url}"}}"#))
}
