//! Request execution
//!
//! One logical request runs strictly in order:
//! 1. attach `Authorization: <scheme> <token>` unless the caller set one
//! 2. first attempt
//! 3. on 401, probe the alternate schemes, recording the first that works
//! 4. still 401: single-flight refresh, then exactly one more attempt
//!
//! Each attempt is classified as an `Outcome`; only transport failures leave
//! the loop early.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crease_auth::AuthScheme;

use crate::body::{Payload, RequestBody};
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::metrics;
use crate::transport::{HttpRequest, HttpResponse, TransportError};

/// Per-call options. Defaults: GET, no extra headers, no body,
/// authenticated, client timeout, scheme probing on.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub auth: bool,
    /// `None` uses the client's configured timeout.
    pub timeout: Option<Duration>,
    pub retry_schemes_on_401: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            auth: true,
            timeout: None,
            retry_schemes_on_401: true,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Merge `headers` over any already set. A name present in `headers`
    /// replaces all earlier values for it; repeated values are all kept.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_schemes_on_401(mut self, retry: bool) -> Self {
        self.retry_schemes_on_401 = retry;
        self
    }
}

/// Successful (2xx) response. `data` is `None` when the body is not JSON.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub data: Option<Value>,
}

impl ApiResponse {
    /// Deserialize `data` into `T`. A missing body deserializes from `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Classification of one attempt.
#[derive(Debug)]
pub(crate) enum Outcome {
    Success(HttpResponse),
    /// 401: candidates for scheme probing and refresh.
    Retryable401(HttpResponse),
    ApplicationError(HttpResponse),
}

impl Outcome {
    fn classify(response: HttpResponse) -> Self {
        if response.status.is_success() {
            Outcome::Success(response)
        } else if response.status == StatusCode::UNAUTHORIZED {
            Outcome::Retryable401(response)
        } else {
            Outcome::ApplicationError(response)
        }
    }

    fn is_unauthorized(&self) -> bool {
        matches!(self, Outcome::Retryable401(_))
    }

    fn into_result(self) -> Result<ApiResponse> {
        match self {
            Outcome::Success(response) => Ok(ApiResponse {
                status: response.status,
                data: parse_json(&response.body),
                headers: response.headers,
            }),
            Outcome::Retryable401(response) | Outcome::ApplicationError(response) => Err(
                Error::http(response.status.as_u16(), parse_json(&response.body)),
            ),
        }
    }
}

/// Parse a body as JSON; anything unparseable (including empty) is `None`.
pub(crate) fn parse_json(body: &[u8]) -> Option<Value> {
    serde_json::from_slice(body).ok()
}

/// `Authorization` value for `scheme` and `token`, marked sensitive.
pub(crate) fn auth_header(scheme: AuthScheme, token: &str) -> Result<HeaderValue> {
    sensitive_value(&scheme.header_value(token))
}

pub(crate) fn sensitive_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| Error::InvalidRequest("token is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

impl ApiClient {
    /// Execute `options` against `path` (relative or absolute).
    ///
    /// Returns the parsed response for 2xx, `Error::Http` for any other final
    /// status, `Error::Timeout`/`Error::Transport` when no response arrived.
    #[instrument(
        skip_all,
        fields(request_id = %request_id(), method = %options.method, path = %path)
    )]
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
        let RequestOptions {
            method,
            mut headers,
            body,
            auth,
            timeout,
            retry_schemes_on_401,
        } = options;

        let (payload, content_type) = body.into_payload()?;
        match (&payload, content_type) {
            (Payload::Multipart(_), _) => {
                headers.remove(CONTENT_TYPE);
            }
            (_, Some(content_type)) if !headers.contains_key(CONTENT_TYPE) => {
                headers.insert(CONTENT_TYPE, content_type);
            }
            _ => {}
        }

        let token = if auth {
            self.tokens.access_token().await
        } else {
            None
        };
        if let Some(token) = &token
            && !headers.contains_key(AUTHORIZATION)
        {
            headers.insert(AUTHORIZATION, auth_header(self.scheme.get(), token)?);
        }

        let mut request = HttpRequest {
            method,
            url: self.make_url(path),
            headers,
            body: payload,
            timeout: timeout.unwrap_or(self.timeout),
        };

        let mut outcome = self.attempt(&request).await?;

        if outcome.is_unauthorized()
            && auth
            && retry_schemes_on_401
            && let Some(token) = &token
        {
            outcome = self.negotiate_scheme(&mut request, token).await?;
        }

        if outcome.is_unauthorized() && auth {
            match self.refresh().await {
                Some(fresh) => {
                    debug!("retrying with refreshed access token");
                    request
                        .headers
                        .insert(AUTHORIZATION, auth_header(self.scheme.get(), &fresh)?);
                    outcome = self.attempt(&request).await?;
                }
                None => debug!("no refreshed token, surfacing 401"),
            }
        }

        outcome.into_result()
    }

    /// Probe the alternates of the recorded scheme in order, stopping at the
    /// first non-401. A scheme that gets past the 401 becomes the recorded one.
    async fn negotiate_scheme(&self, request: &mut HttpRequest, token: &str) -> Result<Outcome> {
        let current = self.scheme.get();
        let mut outcome = None;

        for scheme in current.alternates() {
            debug!(%scheme, "401 received, probing alternate auth scheme");
            metrics::record_scheme_retry(scheme);
            request
                .headers
                .insert(AUTHORIZATION, auth_header(scheme, token)?);

            let attempt = self.attempt(request).await?;
            if !attempt.is_unauthorized() {
                info!(previous = %current, %scheme, "auth scheme accepted, recording it");
                self.scheme.set(scheme);
                return Ok(attempt);
            }
            outcome = Some(attempt);
        }

        outcome.ok_or_else(|| Error::InvalidRequest("no alternate auth scheme".into()))
    }

    /// Send once and classify.
    async fn attempt(&self, request: &HttpRequest) -> Result<Outcome> {
        match self.transport.send(request).await {
            Ok(response) => {
                metrics::record_request(&request.method, response.status.as_u16());
                debug!(status = response.status.as_u16(), "response received");
                Ok(Outcome::classify(response))
            }
            Err(e) => {
                let kind = match e {
                    TransportError::Timeout(_) => "timeout",
                    _ => "network",
                };
                metrics::record_transport_error(kind);
                warn!(error = %e, url = %request.url, "request failed without a response");
                Err(e.into())
            }
        }
    }
}
