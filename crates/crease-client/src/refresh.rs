//! Single-flight token refresh
//!
//! At most one refresh call is on the wire per client. Callers arriving while
//! it is in flight park on a oneshot and receive whatever access token is in
//! storage once the leader finishes. A leader that is cancelled mid-call
//! still releases its waiters (they see `None`) and frees the slot.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crease_auth::{DEFAULT_TIMEOUT_MS, REFRESH_TOKEN_HEADER, extract_credentials};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::body::Payload;
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::metrics;
use crate::request::{auth_header, parse_json, sensitive_value};
use crate::transport::HttpRequest;

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Option<String>>>,
}

/// Tracks whether a refresh is in flight and who is waiting on it.
#[derive(Debug, Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

pub(crate) enum Role<'a> {
    Leader(LeaderGuard<'a>),
    Waiter(oneshot::Receiver<Option<String>>),
}

impl RefreshCoordinator {
    /// Become the leader if nothing is in flight, otherwise queue up.
    pub(crate) fn join(&self) -> Role<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            Role::Waiter(rx)
        } else {
            state.in_flight = true;
            Role::Leader(LeaderGuard {
                coordinator: self,
                released: false,
            })
        }
    }

    pub(crate) fn in_flight(&self) -> bool {
        self.lock().in_flight
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the in-flight flag and hand back everyone queued so far.
    fn release(&self) -> Vec<oneshot::Sender<Option<String>>> {
        let mut state = self.lock();
        state.in_flight = false;
        std::mem::take(&mut state.waiters)
    }
}

/// Held by the refresh leader. Dropping it without `finish` releases waiters
/// with `None`.
pub(crate) struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    released: bool,
}

impl LeaderGuard<'_> {
    /// Publish `token` to every waiter and free the slot.
    pub(crate) fn finish(mut self, token: Option<String>) {
        self.released = true;
        let waiters = self.coordinator.release();
        debug!(waiters = waiters.len(), "releasing refresh waiters");
        for waiter in waiters {
            // A waiter that gave up has dropped its receiver.
            let _ = waiter.send(token.clone());
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            let waiters = self.coordinator.release();
            warn!(
                waiters = waiters.len(),
                "refresh abandoned before completing"
            );
        }
    }
}

impl ApiClient {
    /// Obtain a new access token using the stored refresh token.
    ///
    /// Returns `None` when either token is missing (no network call) or the
    /// refresh failed, in which case both tokens are cleared. Concurrent
    /// callers share one network call.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Option<String> {
        let access = self.tokens.access_token().await?;
        let refresh = self.tokens.refresh_token().await?;

        let guard = match self.refresh.join() {
            Role::Waiter(rx) => {
                debug!("refresh already in flight, waiting");
                return rx.await.ok().flatten();
            }
            Role::Leader(guard) => guard,
        };

        let result = match self.call_refresh(&access, &refresh).await {
            Ok(data) => {
                let credentials = data.as_ref().map(extract_credentials).unwrap_or_default();
                self.tokens.store_credentials(&credentials).await;
                metrics::record_refresh("success");
                info!(
                    rotated_access = credentials.access.is_some(),
                    rotated_refresh = credentials.refresh.is_some(),
                    "token refresh succeeded"
                );
                Some(
                    credentials
                        .access
                        .map(|token| token.expose().clone())
                        .unwrap_or(access),
                )
            }
            Err(e) => {
                metrics::record_refresh("failure");
                warn!(error = %e, "token refresh failed, clearing session");
                self.tokens.clear().await;
                None
            }
        };

        let published = self.tokens.access_token().await;
        guard.finish(published);
        result
    }

    /// POST to the refresh path with the current scheme's `Authorization`
    /// and the refresh token header. No body.
    async fn call_refresh(&self, access: &str, refresh: &str) -> Result<Option<serde_json::Value>> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_header(self.scheme.get(), access)?);
        headers.insert(
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
            sensitive_value(refresh)?,
        );

        let request = HttpRequest {
            method: Method::POST,
            url: self.make_url(&self.refresh_path),
            headers,
            body: Payload::Empty,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        };

        let response = self.transport.send(&request).await?;
        metrics::record_request(&request.method, response.status.as_u16());
        let data = parse_json(&response.body);
        if !response.status.is_success() {
            return Err(Error::http(response.status.as_u16(), data));
        }
        Ok(data)
    }
}
