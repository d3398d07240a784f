//! Fixed names shared by the token layer and the request executor
//!
//! Storage keys are part of the on-device format: changing them orphans
//! every session persisted by an older build.

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Header carrying the refresh token on the refresh call
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Login endpoint, relative to base URL + prefix
pub const LOGIN_PATH: &str = "/auth/login";

/// Registration endpoint, relative to base URL + prefix
pub const REGISTER_PATH: &str = "/auth/register";

/// Refresh endpoint, relative to base URL + prefix
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Per-attempt timeout for ordinary requests and the refresh call
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
