//! In-process mock backend for client tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use crease_auth::MemoryTokenStore;
use serde_json::{Map, Value, json};

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::transport::ReqwestTransport;

/// Serve `router` on an ephemeral port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client with an in-memory store pointed at `url`.
pub(crate) fn client_for(url: &str) -> ApiClient {
    ApiClient::with_transport(
        &ClientConfig::new(url),
        Arc::new(MemoryTokenStore::new()),
        Arc::new(ReqwestTransport::default()),
    )
    .unwrap()
}

/// Client that already holds a session.
pub(crate) async fn seeded_client(url: &str, access: &str, refresh: &str) -> ApiClient {
    let client = client_for(url);
    client.tokens().set_access_token(Some(access)).await;
    client.tokens().set_refresh_token(Some(refresh)).await;
    client
}

#[derive(Default)]
struct Inner {
    accepted: Option<String>,
    login: Option<(StatusCode, Value)>,
    refresh: Option<(StatusCode, Value)>,
    refresh_delay: Option<Duration>,
    refresh_calls: AtomicUsize,
    refresh_headers: Mutex<Vec<(Option<String>, Option<String>)>>,
    seen_auth: Mutex<Vec<Option<String>>>,
    login_bodies: Mutex<Vec<Value>>,
    login_auth: Mutex<Vec<Option<String>>>,
}

/// Scriptable backend speaking the auth and resource routes the client uses.
///
/// Protected routes (`/users`, `/media/upload`) accept exactly one
/// `Authorization` value, set with `accept`; everything else is a 401.
#[derive(Clone, Default)]
pub(crate) struct Backend {
    inner: Arc<Inner>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn push<T>(list: &Mutex<Vec<T>>, item: T) {
    list.lock().unwrap_or_else(PoisonError::into_inner).push(item);
}

fn snapshot<T: Clone>(list: &Mutex<Vec<T>>) -> Vec<T> {
    list.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

impl Backend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn configure(mut self, update: impl FnOnce(&mut Inner)) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("configure before serving");
        update(inner);
        self
    }

    pub(crate) fn accept(self, authorization: &str) -> Self {
        let authorization = authorization.to_owned();
        self.configure(|inner| inner.accepted = Some(authorization))
    }

    pub(crate) fn with_login_body(self, body: Value) -> Self {
        self.configure(|inner| inner.login = Some((StatusCode::OK, body)))
    }

    pub(crate) fn with_login_status(self, status: u16, body: Value) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.configure(|inner| inner.login = Some((status, body)))
    }

    pub(crate) fn with_refresh_body(self, body: Value) -> Self {
        self.configure(|inner| inner.refresh = Some((StatusCode::OK, body)))
    }

    pub(crate) fn with_refresh_status(self, status: u16, body: Value) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.configure(|inner| inner.refresh = Some((status, body)))
    }

    pub(crate) fn with_refresh_delay(self, delay: Duration) -> Self {
        self.configure(|inner| inner.refresh_delay = Some(delay))
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    /// `(Authorization, x-refresh-token)` per refresh call.
    pub(crate) fn refresh_headers(&self) -> Vec<(Option<String>, Option<String>)> {
        snapshot(&self.inner.refresh_headers)
    }

    /// `Authorization` per hit on a protected route, in arrival order.
    pub(crate) fn seen_auth(&self) -> Vec<Option<String>> {
        snapshot(&self.inner.seen_auth)
    }

    pub(crate) fn login_bodies(&self) -> Vec<Value> {
        snapshot(&self.inner.login_bodies)
    }

    pub(crate) fn login_auth_headers(&self) -> Vec<Option<String>> {
        snapshot(&self.inner.login_auth)
    }

    pub(crate) fn router(&self) -> Router {
        Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/echo", any(echo))
            .route("/users", get(users))
            .route("/media/upload", post(upload))
            .route("/plain", get(|| async { "ok" }))
            .route("/teams/404", get(missing_team))
            .route("/slow", get(slow))
            .with_state(self.clone())
    }

    /// Record the header and report whether it is the accepted one.
    fn authorize(&self, headers: &HeaderMap) -> bool {
        let authorization = header(headers, "authorization");
        let ok = authorization.is_some() && authorization == self.inner.accepted;
        push(&self.inner.seen_auth, authorization);
        ok
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "Unauthorized" })),
    )
        .into_response()
}

async fn login(State(backend): State<Backend>, headers: HeaderMap, body: String) -> Response {
    push(
        &backend.inner.login_bodies,
        serde_json::from_str(&body).unwrap_or(Value::Null),
    );
    push(&backend.inner.login_auth, header(&headers, "authorization"));

    let (status, body) = backend.inner.login.clone().unwrap_or_else(|| {
        (
            StatusCode::OK,
            json!({
                "success": true,
                "data": { "tokens": { "accessToken": "login_at", "refreshToken": "login_rt" } }
            }),
        )
    });
    (status, Json(body)).into_response()
}

async fn register() -> Json<Value> {
    Json(json!({ "token": "register_at" }))
}

async fn refresh(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
    push(
        &backend.inner.refresh_headers,
        (
            header(&headers, "authorization"),
            header(&headers, "x-refresh-token"),
        ),
    );
    if let Some(delay) = backend.inner.refresh_delay {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = backend.inner.refresh.clone().unwrap_or_else(|| {
        (
            StatusCode::OK,
            json!({ "data": { "accessToken": "fresh_at", "refreshToken": "fresh_rt" } }),
        )
    });
    (status, Json(body)).into_response()
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_owned(), Value::String(v.to_owned())))
        })
        .collect();
    Json(json!({ "method": method.as_str(), "headers": headers, "body": body }))
}

async fn users(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorize(&headers) {
        return unauthorized();
    }
    Json(json!({
        "success": true,
        "data": [{ "id": 1, "name": "Asha" }, { "id": 2, "name": "Ravi" }]
    }))
    .into_response()
}

async fn upload(State(backend): State<Backend>, headers: HeaderMap, body: String) -> Response {
    if !backend.authorize(&headers) {
        return unauthorized();
    }
    Json(json!({
        "contentType": header(&headers, "content-type"),
        "body": body,
    }))
    .into_response()
}

async fn missing_team() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Team not found" })),
    )
        .into_response()
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_millis(500)).await;
    "late"
}
