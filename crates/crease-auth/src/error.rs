//! Error types for token storage

/// Errors from a `TokenStore` backend.
///
/// These never reach API callers: `TokenVault` logs them and falls back to
/// its in-process copy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("token file parse error: {0}")]
    Parse(String),

    #[error("token storage unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
