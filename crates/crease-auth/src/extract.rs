//! Token extraction from loosely shaped auth responses
//!
//! Login, registration and refresh responses put tokens under different key
//! spellings and nesting depths (`token`, `accessToken`, `data.tokens.access`,
//! `session.access_token`, the first element of an array, ...). Candidates are
//! data: a list of containers crossed with a list of key spellings, each pair
//! forming a JSON pointer. Pointers are probed container-major and the first
//! non-empty string wins.

use common::SecretString;
use serde_json::Value;

/// Locations a token pair may be nested under, most specific last.
/// Numeric segments index into arrays.
const CONTAINERS: &[&str] = &[
    "",
    "/data",
    "/tokens",
    "/data/tokens",
    "/session",
    "/data/session",
    "/result",
    "/result/tokens",
    "/0",
    "/data/0",
];

const ACCESS_KEYS: &[&str] = &["token", "accessToken", "access_token", "access"];

const REFRESH_KEYS: &[&str] = &["refreshToken", "refresh_token", "refresh"];

/// Which half of the token pair to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn keys(self) -> &'static [&'static str] {
        match self {
            TokenKind::Access => ACCESS_KEYS,
            TokenKind::Refresh => REFRESH_KEYS,
        }
    }
}

/// Tokens found in one response. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access: Option<SecretString>,
    pub refresh: Option<SecretString>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Ordered JSON pointers probed for `kind`.
pub fn candidate_pointers(kind: TokenKind) -> impl Iterator<Item = String> {
    CONTAINERS.iter().flat_map(move |container| {
        kind.keys()
            .iter()
            .map(move |key| format!("{container}/{key}"))
    })
}

/// First non-empty string found at any candidate pointer.
pub fn extract_token(body: &Value, kind: TokenKind) -> Option<String> {
    candidate_pointers(kind).find_map(|pointer| match body.pointer(&pointer) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

pub fn extract_access_token(body: &Value) -> Option<String> {
    extract_token(body, TokenKind::Access)
}

pub fn extract_refresh_token(body: &Value) -> Option<String> {
    extract_token(body, TokenKind::Refresh)
}

/// Both halves, probed independently.
pub fn extract_credentials(body: &Value) -> Credentials {
    Credentials {
        access: extract_access_token(body).map(SecretString::from),
        refresh: extract_refresh_token(body).map(SecretString::from),
    }
}
