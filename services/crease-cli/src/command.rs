//! Command-line parsing and dispatch

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use crease_client::ApiClient;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};

#[derive(Debug, Parser)]
#[command(name = "crease", about = "Command-line client for the crease API")]
pub struct Cli {
    /// Config file; falls back to $CREASE_CONFIG, then ./crease.toml
    #[arg(long, global = true)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum Command {
    /// Log in and store the session tokens
    Login { email: String, password: String },
    /// Create an account; tokens in the response start a session
    Register {
        #[arg(value_parser = parse_json)]
        body: Value,
    },
    /// Forget the stored session
    Logout,
    /// Exchange the refresh token for a new access token
    Refresh,
    Get {
        path: String,
    },
    Post {
        path: String,
        #[arg(value_parser = parse_json, default_value = "{}")]
        body: Value,
    },
    Put {
        path: String,
        #[arg(value_parser = parse_json, default_value = "{}")]
        body: Value,
    },
    Patch {
        path: String,
        #[arg(value_parser = parse_json, default_value = "{}")]
        body: Value,
    },
    Delete {
        path: String,
    },
    /// Show the base URL, stored token presence and auth scheme
    Whoami,
}

fn parse_json(raw: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("body is not valid JSON: {e}"))
}

/// Execute `command`, returning the JSON to print (if any).
pub async fn run(client: &ApiClient, command: Command) -> Result<Option<Value>> {
    let response = match command {
        Command::Login { email, password } => client.login(&email, &password).await?,
        Command::Register { body } => client.register(body).await?,
        Command::Logout => {
            client.logout().await;
            return Ok(None);
        }
        Command::Refresh => {
            let refreshed = client.refresh().await.is_some();
            if !refreshed {
                bail!("refresh failed: log in again");
            }
            return Ok(Some(json!({ "refreshed": true })));
        }
        Command::Whoami => {
            let credentials = client.credentials().await;
            return Ok(Some(json!({
                "baseUrl": client.base_url(),
                "hasAccessToken": credentials.access.is_some(),
                "hasRefreshToken": credentials.refresh.is_some(),
                "scheme": client.auth_scheme().as_str(),
            })));
        }
        Command::Get { path } => client.get(&path, HeaderMap::new()).await?,
        Command::Post { path, body } => client.post(&path, body, HeaderMap::new()).await?,
        Command::Put { path, body } => client.put(&path, body, HeaderMap::new()).await?,
        Command::Patch { path, body } => client.patch(&path, body, HeaderMap::new()).await?,
        Command::Delete { path } => client.delete(&path, HeaderMap::new()).await?,
    };
    Ok(response.data)
}
