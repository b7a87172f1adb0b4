//! Repository API error types

use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the repository API
#[derive(Debug, Clone, Error)]
pub enum RepoError {
    /// The API answered with a non-2xx status
    #[error("{status} for url: {url}")]
    Http {
        status: StatusCode,
        url: String,
        body: String,
    },
    /// The request never produced a response (DNS, connect, timeout)
    #[error("{0}")]
    Transport(String),
    /// A 2xx response whose body could not be understood
    #[error("Failed to parse response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RepoError {
    /// Response body, when the API produced one
    pub fn body(&self) -> Option<&str> {
        match self {
            RepoError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            RepoError::Transport(format!("Request timeout: {err}"))
        } else if err.is_connect() {
            RepoError::Transport(format!("Connection failed: {err}"))
        } else {
            RepoError::Transport(format!("Request failed: {err}"))
        }
    }
}
