//! Token lifecycle primitives for the crease API client
//!
//! Storage, header schemes and response parsing, with no HTTP in sight:
//!
//! - `store`: the injected `TokenStore` capability plus file and memory backends
//! - `vault`: infallible token accessors that degrade to memory on storage errors
//! - `scheme`: `Authorization` keywords and the per-client advisory scheme cell
//! - `extract`: access/refresh token discovery in heterogeneous JSON responses

pub mod constants;
pub mod error;
pub mod extract;
pub mod scheme;
pub mod store;
pub mod vault;

pub use constants::*;
pub use error::{Error, Result};
pub use extract::{
    Credentials, TokenKind, extract_access_token, extract_credentials, extract_refresh_token,
    extract_token,
};
pub use scheme::{AuthScheme, SchemeCell};
pub use store::{FileTokenStore, MemoryTokenStore, StoreFuture, TokenStore};
pub use vault::TokenVault;
