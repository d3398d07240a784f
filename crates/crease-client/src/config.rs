//! Client configuration and URL construction
//!
//! Base URL precedence: `EXPO_PUBLIC_API_BASE_URL` > `API_BASE_URL` > config.
//! There is no built-in default host; a client without a base URL refuses to
//! start.

use std::time::Duration;

use crease_auth::{DEFAULT_TIMEOUT_MS, LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variables consulted for the base URL, in order.
pub const BASE_URL_ENV_VARS: [&str; 2] = ["EXPO_PUBLIC_API_BASE_URL", "API_BASE_URL"];

/// Client settings, usually embedded as the `[api]` table of the CLI config.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_prefix: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_register_path")]
    pub register_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_login_path() -> String {
    LOGIN_PATH.into()
}

fn default_register_path() -> String {
    REGISTER_PATH.into()
}

fn default_refresh_path() -> String {
    REFRESH_PATH.into()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_prefix: String::new(),
            timeout_ms: default_timeout_ms(),
            login_path: default_login_path(),
            register_path: default_register_path(),
            refresh_path: default_refresh_path(),
        }
    }
}

impl ClientConfig {
    /// Config with an explicit base URL and defaults elsewhere.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Resolve the base URL from the environment, then `configured`.
pub fn resolve_base_url(configured: Option<&str>) -> Result<String> {
    resolve_base_url_with(configured, |key| std::env::var(key).ok())
}

/// `resolve_base_url` with an injectable environment lookup.
pub fn resolve_base_url_with(
    configured: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let from_env = BASE_URL_ENV_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty());

    let raw = from_env
        .or_else(|| configured.map(str::to_owned))
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "no API base URL: set {} or base_url",
                BASE_URL_ENV_VARS.join(", ")
            ))
        })?;

    let url = raw.trim().trim_end_matches('/').to_owned();
    if !is_absolute_url(&url) {
        return Err(Error::Config(format!(
            "base URL must start with http:// or https://, got: {url}"
        )));
    }
    Ok(url)
}

/// `"api"`, `"/api/"` and `"//api"` all become `"/api"`; blank stays blank.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Join `base` and `parts` with exactly one slash between non-empty segments.
pub fn join_url(base: &str, parts: &[&str]) -> String {
    std::iter::once(base.trim_end_matches('/'))
        .chain(parts.iter().map(|part| part.trim_matches('/')))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `http://` or `https://`, case-insensitive.
pub fn is_absolute_url(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Base URL plus API prefix, mutable at runtime through the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    prefix: String,
}

impl Endpoint {
    pub fn new(base_url: &str, prefix: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            prefix: normalize_prefix(prefix),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_base_url(&mut self, url: &str) {
        self.base_url = url.trim_end_matches('/').to_owned();
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = normalize_prefix(prefix);
    }

    /// Absolute URLs pass through; relative paths get base + prefix.
    pub fn make_url(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_owned();
        }
        join_url(&self.base_url, &[&self.prefix, path])
    }
}
