//! Authenticated REST client for the crease backend
//!
//! Wraps a fetch-like transport with session handling so callers only deal
//! in paths and JSON. This crate depends on `crease-auth` for storage and
//! token parsing; it never touches process-global state.
//!
//! Request flow:
//! 1. `ApiClient::request()` attaches `Authorization` under the recorded scheme
//! 2. A 401 probes the alternate schemes (`Bearer`, `JWT`, `Token`) in order
//! 3. Still 401: `ApiClient::refresh()` runs once per client, concurrent
//!    callers share the result
//! 4. The request is replayed exactly once with the refreshed token
//! 5. Non-2xx responses surface as `Error::Http` with the backend's message

pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
mod refresh;
pub mod request;
pub mod transport;

#[cfg(test)]
mod testing;

pub use body::{MultipartBody, Payload, RequestBody};
pub use client::ApiClient;
pub use config::{BASE_URL_ENV_VARS, ClientConfig, is_absolute_url, join_url, resolve_base_url};
pub use crease_auth::{
    AuthScheme, Credentials, FileTokenStore, MemoryTokenStore, TokenStore, TokenVault,
};
pub use error::{Error, Result, error_message};
pub use request::{ApiResponse, RequestOptions};
pub use transport::{
    HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError, TransportFuture,
};
