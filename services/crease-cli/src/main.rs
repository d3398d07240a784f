//! crease command-line client
//!
//! Thin shell over `crease-client`:
//! 1. Loads `crease.toml` (or `--config` / `CREASE_CONFIG`)
//! 2. Opens the token file, falling back to memory if it is unusable
//! 3. Runs one command and prints the response data as JSON on stdout
//!
//! Logs go to stderr as JSON so stdout stays pipeable.

mod command;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use crease_auth::{FileTokenStore, MemoryTokenStore, TokenStore};
use crease_client::ApiClient;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::command::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = if cli.config.is_some() || config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        info!(path = %config_path.display(), "no config file, using defaults");
        Config::from_env().context("invalid configuration")?
    };

    let store = open_store(&config).await;
    let client = ApiClient::new(&config.api, store).context("failed to create API client")?;

    if let Some(data) = command::run(&client, cli.command).await? {
        println!("{}", serde_json::to_string_pretty(&data)?);
    }
    Ok(())
}

/// File-backed store, or an in-memory one if the file cannot be used.
///
/// A memory store still works for a single invocation; the session just
/// won't survive it.
async fn open_store(config: &Config) -> Arc<dyn TokenStore> {
    let path = config.storage.token_file.clone();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        warn!(path = %parent.display(), error = %e, "cannot create token directory");
    }

    match FileTokenStore::load(path.clone()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "token file unusable, session will not persist"
            );
            Arc::new(MemoryTokenStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_lands_in_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.token_file = dir.path().join("nested/deeper/tokens.json");

        let store = open_store(&config).await;
        store.set("accessToken", "at").await.unwrap();

        assert!(config.storage.token_file.exists());
        assert_eq!(store.get("accessToken").await.unwrap().as_deref(), Some("at"));
    }

    #[tokio::test]
    async fn corrupt_token_file_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut config = Config::default();
        config.storage.token_file = path.clone();

        let store = open_store(&config).await;
        store.set("accessToken", "at").await.unwrap();

        assert_eq!(store.get("accessToken").await.unwrap().as_deref(), Some("at"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
