//! The API client and its public surface
//!
//! Base URL, prefix, the recorded auth scheme and refresh bookkeeping all
//! live on an `ApiClient` instance. Two clients in one process never observe
//! each other's state.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crease_auth::{
    AuthScheme, Credentials, SchemeCell, TokenStore, TokenVault, extract_credentials,
};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::body::{MultipartBody, RequestBody};
use crate::config::{ClientConfig, Endpoint, resolve_base_url};
use crate::error::Result;
use crate::refresh::RefreshCoordinator;
use crate::request::{ApiResponse, RequestOptions};
use crate::transport::{ReqwestTransport, Transport};

/// Authenticated REST client.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct ApiClient {
    pub(crate) endpoint: RwLock<Endpoint>,
    pub(crate) timeout: Duration,
    pub(crate) login_path: String,
    pub(crate) register_path: String,
    pub(crate) refresh_path: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) tokens: TokenVault,
    pub(crate) scheme: SchemeCell,
    pub(crate) refresh: RefreshCoordinator,
}

impl ApiClient {
    /// Client over reqwest. The base URL is resolved from the environment
    /// first, then `config.base_url`.
    pub fn new(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::with_transport(config, store, Arc::new(ReqwestTransport::default()))
    }

    pub fn with_transport(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let base_url = resolve_base_url(config.base_url.as_deref())?;
        let endpoint = Endpoint::new(&base_url, &config.api_prefix);
        info!(
            base_url = %endpoint.base_url(),
            prefix = %endpoint.prefix(),
            timeout_ms = config.timeout_ms,
            "api client initialized"
        );

        Ok(Self {
            endpoint: RwLock::new(endpoint),
            timeout: config.timeout(),
            login_path: config.login_path.clone(),
            register_path: config.register_path.clone(),
            refresh_path: config.refresh_path.clone(),
            transport,
            tokens: TokenVault::new(store),
            scheme: SchemeCell::new(AuthScheme::default()),
            refresh: RefreshCoordinator::default(),
        })
    }

    pub fn base_url(&self) -> String {
        self.endpoint().base_url().to_owned()
    }

    pub fn set_base_url(&self, url: &str) {
        self.endpoint_mut(|endpoint| endpoint.set_base_url(url));
    }

    pub fn api_prefix(&self) -> String {
        self.endpoint().prefix().to_owned()
    }

    pub fn set_api_prefix(&self, prefix: &str) {
        self.endpoint_mut(|endpoint| endpoint.set_prefix(prefix));
    }

    /// Absolute URL for `path` under the current base URL and prefix.
    pub fn make_url(&self, path: &str) -> String {
        self.endpoint().make_url(path)
    }

    /// Scheme the next authenticated request will try first.
    pub fn auth_scheme(&self) -> AuthScheme {
        self.scheme.get()
    }

    /// Token accessors, for callers that manage sessions themselves.
    pub fn tokens(&self) -> &TokenVault {
        &self.tokens
    }

    pub async fn credentials(&self) -> Credentials {
        self.tokens.credentials().await
    }

    pub async fn get(&self, path: &str, headers: HeaderMap) -> Result<ApiResponse> {
        self.request(path, RequestOptions::new(Method::GET).headers(headers))
            .await
    }

    pub async fn post(
        &self,
        path: &str,
        body: impl Into<RequestBody>,
        headers: HeaderMap,
    ) -> Result<ApiResponse> {
        self.request(
            path,
            RequestOptions::new(Method::POST).body(body).headers(headers),
        )
        .await
    }

    pub async fn put(
        &self,
        path: &str,
        body: impl Into<RequestBody>,
        headers: HeaderMap,
    ) -> Result<ApiResponse> {
        self.request(
            path,
            RequestOptions::new(Method::PUT).body(body).headers(headers),
        )
        .await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: impl Into<RequestBody>,
        headers: HeaderMap,
    ) -> Result<ApiResponse> {
        self.request(
            path,
            RequestOptions::new(Method::PATCH).body(body).headers(headers),
        )
        .await
    }

    pub async fn delete(&self, path: &str, headers: HeaderMap) -> Result<ApiResponse> {
        self.request(path, RequestOptions::new(Method::DELETE).headers(headers))
            .await
    }

    /// Multipart POST, e.g. to `/media/upload`.
    pub async fn upload(&self, path: &str, form: MultipartBody) -> Result<ApiResponse> {
        self.request(path, RequestOptions::new(Method::POST).body(form))
            .await
    }

    /// Log in with email and password against the configured login path.
    pub async fn login(&self, email: &str, password: &str) -> Result<ApiResponse> {
        let path = self.login_path.clone();
        self.authenticate(&path, json!({ "email": email, "password": password }))
            .await
    }

    /// Create an account; a registration response that carries tokens starts
    /// a session just like a login.
    pub async fn register(&self, body: Value) -> Result<ApiResponse> {
        let path = self.register_path.clone();
        self.authenticate(&path, body).await
    }

    /// Unauthenticated POST to `path`, persisting any tokens in the response.
    ///
    /// A response without an access token is not an error: the caller gets
    /// the response and no session is stored.
    pub async fn authenticate(&self, path: &str, body: Value) -> Result<ApiResponse> {
        let response = self
            .request(
                path,
                RequestOptions::new(Method::POST).body(body).auth(false),
            )
            .await?;

        let credentials = response
            .data
            .as_ref()
            .map(extract_credentials)
            .unwrap_or_default();

        if credentials.access.is_none() {
            warn!(path, "auth response contained no access token");
        } else {
            info!(
                path,
                has_refresh = credentials.refresh.is_some(),
                "session established"
            );
        }
        self.tokens.store_credentials(&credentials).await;
        Ok(response)
    }

    /// Forget the session locally. No network call is made; server-side
    /// invalidation is up to the caller.
    pub async fn logout(&self) {
        self.tokens.clear().await;
        info!("logged out");
    }

    fn endpoint(&self) -> Endpoint {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn endpoint_mut(&self, update: impl FnOnce(&mut Endpoint)) {
        let mut endpoint = self.endpoint.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut endpoint);
    }
}
