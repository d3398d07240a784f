//! Network transport seam
//!
//! The executor never talks to reqwest directly: it hands a fully built
//! `HttpRequest` to a `Transport` and gets back the status, headers and raw
//! body. `ReqwestTransport` is the production implementation; tests can swap
//! in anything that speaks the trait.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};

use crate::body::{FieldValue, MultipartBody, Payload};

/// One attempt, ready for the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Payload,
    pub timeout: Duration,
}

/// Raw response. The body is fully buffered.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Failures that produced no HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("could not encode request body: {0}")]
    Body(String),
}

/// Boxed future returned by `Transport::send`.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>>;

/// Fetch-like capability: send one request, return one response.
///
/// Implementations must enforce `request.timeout` for the whole exchange,
/// including reading the body, and report it as `TransportError::Timeout`.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a>;
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let timeout = request.timeout;
            let mut builder = self
                .client
                .request(request.method.clone(), &request.url)
                .headers(request.headers.clone())
                .timeout(timeout);

            builder = match &request.body {
                Payload::Empty => builder,
                Payload::Bytes(bytes) => builder.body(bytes.clone()),
                Payload::Multipart(form) => builder.multipart(build_form(form)?),
            };

            let response = builder
                .send()
                .await
                .map_err(|e| classify(e, timeout))?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Rebuild a reqwest form from the replayable description.
fn build_form(body: &MultipartBody) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for field in &body.fields {
        form = match &field.value {
            FieldValue::Text(text) => form.text(field.name.clone(), text.clone()),
            FieldValue::File {
                bytes,
                file_name,
                content_type,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.to_vec())
                    .file_name(file_name.clone())
                    .mime_str(content_type)
                    .map_err(|e| {
                        TransportError::Body(format!("invalid mime type {content_type:?}: {e}"))
                    })?;
                form.part(field.name.clone(), part)
            }
        };
    }
    Ok(form)
}
