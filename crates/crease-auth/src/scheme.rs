//! Authorization header schemes
//!
//! The backend does not commit to one spelling of the `Authorization` header
//! keyword. The client starts with `Bearer` and, on a 401, probes the other
//! schemes in a fixed cyclic order: `Bearer -> JWT -> Token -> Bearer`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Keyword preceding the token in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    #[default]
    Bearer,
    Jwt,
    Token,
}

impl AuthScheme {
    /// Probe order. Alternates are taken cyclically from here.
    pub const ALL: [AuthScheme; 3] = [AuthScheme::Bearer, AuthScheme::Jwt, AuthScheme::Token];

    /// Header keyword as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthScheme::Bearer => "Bearer",
            AuthScheme::Jwt => "JWT",
            AuthScheme::Token => "Token",
        }
    }

    /// Full `Authorization` header value for `token`.
    pub fn header_value(self, token: &str) -> String {
        format!("{} {token}", self.as_str())
    }

    /// The other schemes, starting just after `self` and wrapping around.
    pub fn alternates(self) -> impl Iterator<Item = AuthScheme> {
        let start = self.index();
        (1..Self::ALL.len()).map(move |offset| Self::ALL[(start + offset) % Self::ALL.len()])
    }

    fn index(self) -> usize {
        match self {
            AuthScheme::Bearer => 0,
            AuthScheme::Jwt => 1,
            AuthScheme::Token => 2,
        }
    }

    fn from_index(index: u8) -> Self {
        match index {
            1 => AuthScheme::Jwt,
            2 => AuthScheme::Token,
            _ => AuthScheme::Bearer,
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown auth scheme: {s}"))
    }
}

/// Last scheme known to work, shared by all requests of one client.
///
/// Advisory only: two requests discovering the same winner may both write it,
/// and every request still starts from whatever is recorded at that moment.
#[derive(Debug, Default)]
pub struct SchemeCell(AtomicU8);

impl SchemeCell {
    pub fn new(scheme: AuthScheme) -> Self {
        Self(AtomicU8::new(scheme.index() as u8))
    }

    pub fn get(&self) -> AuthScheme {
        AuthScheme::from_index(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, scheme: AuthScheme) {
        self.0.store(scheme.index() as u8, Ordering::Relaxed);
    }
}
