//! Telegram Bot API transport
//!
//! `TelegramClient` is the outgoing side (`sendMessage`) and the long-poll
//! source (`getUpdates`). The bot token is part of every method URL, so
//! request URLs are never logged and are stripped from transport errors.

mod poller;
pub mod types;

pub use poller::run_polling;

use crate::runtime::ChatClient;
use crate::state_machine::state::ChatId;
use crate::state_machine::ReplyKeyboard;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use types::{ApiResponse, GetUpdatesBody, ReplyMarkup, SendMessageBody, Update};

/// Public Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Slack on top of the long-poll timeout before the HTTP request gives up
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

/// Errors from the chat transport
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode Telegram response: {0}")]
    Decode(String),
}

pub struct TelegramClient {
    client: Client,
    /// `{api}/bot{token}`; secret
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, ChatError> {
        let body = GetUpdatesBody {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &body, Some(timeout + LONG_POLL_GRACE))
            .await
    }

    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, ChatError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.without_url().to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.without_url().to_string()))?;

        match serde_json::from_str::<ApiResponse<T>>(&text) {
            Ok(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(reply) => Err(ChatError::Api {
                code: reply
                    .error_code
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                description: reply
                    .description
                    .unwrap_or_else(|| format!("{method} returned no result")),
            }),
            Err(_) if !status.is_success() => Err(ChatError::Api {
                code: i64::from(status.as_u16()),
                description: text,
            }),
            Err(e) => Err(ChatError::Decode(format!("{method}: {e}"))),
        }
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<(), ChatError> {
        let body = SendMessageBody {
            chat_id,
            text,
            reply_markup: ReplyMarkup::from_keyboard(keyboard),
        };
        let _: serde_json::Value = self.call("sendMessage", &body, None).await?;
        Ok(())
    }
}
