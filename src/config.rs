//! Process configuration, read once at startup

use crate::github::DEFAULT_HTTP_TIMEOUT;
use crate::state_machine::state::{UserId, DEFAULT_SESSION_TTL};
use crate::telegram::DEFAULT_API_URL;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How updates reach the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// `getUpdates` long polling
    Polling,
    /// Telegram pushes updates to our HTTP endpoint
    Webhook,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "polling" => Ok(Self::Polling),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("expected polling or webhook, got {other:?}")),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// Repository API base, e.g. `https://api.github.com/repos/owner/name`
    pub repo_url: String,
    pub repo_token: String,
    pub workflow_file: String,
    pub bot_token: String,
    pub allowed_users: Vec<UserId>,
    pub app_name: String,
    pub transport: TransportMode,
    pub port: u16,
    pub webhook_secret: Option<String>,
    pub telegram_api_url: String,
    /// `None` disables session expiry
    pub session_ttl: Option<Duration>,
    pub http_timeout: Duration,
    pub poll_timeout: Duration,
}

// Tokens stay out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("repo_url", &self.repo_url)
            .field("workflow_file", &self.workflow_file)
            .field("allowed_users", &self.allowed_users)
            .field("app_name", &self.app_name)
            .field("transport", &self.transport)
            .field("port", &self.port)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("telegram_api_url", &self.telegram_api_url)
            .field("session_ttl", &self.session_ttl)
            .field("http_timeout", &self.http_timeout)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let ttl_secs = parse_or(&get, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL.as_secs())?;
        let session_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        Ok(Self {
            repo_url: required("URL")?,
            repo_token: required("AUTH_TOKEN")?,
            workflow_file: get("WORKFLOW_FILE").unwrap_or_else(|| "ci.yaml".to_string()),
            bot_token: required("BOT_TOKEN")?,
            allowed_users: parse_user_ids(&required("RESTRICTED_IDS")?)?,
            app_name: get("APP_NAME").unwrap_or_else(|| "Cocktail Master".to_string()),
            transport: parse_or(&get, "BOT_TRANSPORT", TransportMode::Polling)?,
            port: parse_or(&get, "PORT", 8080)?,
            webhook_secret: get("WEBHOOK_SECRET"),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            session_ttl,
            http_timeout: Duration::from_secs(parse_or(
                &get,
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT.as_secs(),
            )?),
            poll_timeout: Duration::from_secs(parse_or(&get, "POLL_TIMEOUT_SECS", 30)?),
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Comma-separated Telegram user ids
fn parse_user_ids(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse().map_err(|_| ConfigError::Invalid {
                name: "RESTRICTED_IDS",
                reason: format!("{id:?} is not a user id"),
            })
        })
        .collect()
}
