//! Single-request HTTP transport with a hard timeout.
//!
//! [`Transport`] knows nothing about jobs. It sends one request and
//! returns the status code and body, or a classified [`TransportError`].
//! Non-2xx responses are returned as-is; the caller decides what they
//! mean because submission and polling treat them differently. There
//! are no retries at this layer.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One part of a multipart body.
#[derive(Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub file_name: Option<String>,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl MultipartPart {
    /// A plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            mime: None,
            bytes: value.into().into_bytes(),
        }
    }

    /// A field carrying a JSON document.
    pub fn json(name: impl Into<String>, value: &serde_json::Value) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            mime: Some("application/json".to_string()),
            bytes: value.to_string().into_bytes(),
        }
    }

    /// A file upload.
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            mime: Some(mime.into()),
            bytes,
        }
    }

    /// The part's content as UTF-8, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

impl fmt::Debug for MultipartPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartPart")
            .field("name", &self.name)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<MultipartPart>),
}

/// Everything needed to perform one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Method::Get, url.into(), timeout)
    }

    pub fn post(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Method::Post, url.into(), timeout)
    }

    fn new(method: Method, url: String, timeout: Duration) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }
}

/// A completed HTTP exchange, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single network request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, spec: RequestSpec) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by [`reqwest`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&self, spec: RequestSpec) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = match spec.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &spec.url);
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        Ok(match spec.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, spec: RequestSpec) -> Result<TransportResponse, TransportError> {
        let timeout = spec.timeout;
        let url = spec.url.clone();
        let builder = self.build(spec)?;

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(TransportResponse { status, body })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => {
                tracing::debug!(url = %url, status = response.status, "HTTP exchange complete");
                Ok(response)
            }
            Ok(Err(e)) => Err(TransportError::from_reqwest(e, timeout)),
            Err(_) => {
                tracing::debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "HTTP request timed out");
                Err(TransportError::Timeout { after: timeout })
            }
        }
    }
}

fn build_form(parts: Vec<MultipartPart>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for part in parts {
        let mut body = Part::bytes(part.bytes);
        if let Some(file_name) = part.file_name {
            body = body.file_name(file_name);
        }
        if let Some(mime) = part.mime {
            body = body
                .mime_str(&mime)
                .map_err(|e| TransportError::InvalidRequest(format!("bad MIME type '{mime}': {e}")))?;
        }
        form = form.part(part.name, body);
    }
    Ok(form)
}
