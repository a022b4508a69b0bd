use anyhow::{Context, Result};
use std::env;

/// Default listening port when `PORT` is not set.
const DEFAULT_PORT: u16 = 8080;

/// Runtime configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for both the HTTP endpoints and the WebSocket upgrade.
    pub port: u16,

    /// Shared secret expected in the `X-Gitlab-Token` header. When unset,
    /// webhook requests are accepted without a token check.
    pub webhook_secret: Option<String>,

    /// Endpoint URL for the external chat notification. When unset, the
    /// notifier is a no-op.
    pub notify_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("Invalid PORT value: '{value}'"))?,
            Err(_) => DEFAULT_PORT,
        };
        Ok(Self {
            port,
            webhook_secret: non_empty_var("GITLAB_WEBHOOK_SECRET"),
            notify_url: non_empty_var("NOTIFY_WEBHOOK_URL"),
        })
    }
}

/// Reads an optional variable, treating an empty value as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
