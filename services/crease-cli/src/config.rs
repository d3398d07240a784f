//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The base URL is resolved and validated by the client itself
//! (`EXPO_PUBLIC_API_BASE_URL`, `API_BASE_URL`, then `[api].base_url`); this
//! module only handles the file and the token location.

use crease_client::ClientConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Env var overriding `[storage].token_file`
pub const TOKEN_FILE_ENV: &str = "CREASE_TOKEN_FILE";

/// Env var naming the config file when `--config` is absent
pub const CONFIG_PATH_ENV: &str = "CREASE_CONFIG";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ClientConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where the session survives between invocations
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

fn default_token_file() -> PathBuf {
    PathBuf::from(".crease/tokens.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Defaults plus environment, for runs without a config file.
    pub fn from_env() -> common::Result<Self> {
        Config::default().finish()
    }

    fn finish(mut self) -> common::Result<Self> {
        if self.api.timeout_ms == 0 {
            return Err(common::Error::Config(
                "timeout_ms must be greater than 0".into(),
            ));
        }

        if let Ok(path) = std::env::var(TOKEN_FILE_ENV)
            && !path.trim().is_empty()
        {
            self.storage.token_file = PathBuf::from(path.trim());
        }

        if self.storage.token_file.as_os_str().is_empty() {
            return Err(common::Error::Config("token_file must not be empty".into()));
        }

        Ok(self)
    }

    /// Resolve config file path from CLI arg or CREASE_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from("crease.toml")
    }
}
