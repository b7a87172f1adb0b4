//! HTTP surface for the webhook transport
//!
//! Telegram POSTs each update to `/telegram`; `/health` is for probes.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::{ChatClient, RepoClient, RuntimeManager};
use std::sync::Arc;

/// Header Telegram sets when the webhook was registered with a secret
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Application state shared across handlers
pub struct AppState<R, C>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    pub runtime: Arc<RuntimeManager<R, C>>,
    pub webhook_secret: Option<Arc<str>>,
}

impl<R, C> AppState<R, C>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    pub fn new(runtime: Arc<RuntimeManager<R, C>>, webhook_secret: Option<String>) -> Self {
        Self {
            runtime,
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }
}

// Derived Clone would require R: Clone and C: Clone
impl<R, C> Clone for AppState<R, C>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            webhook_secret: self.webhook_secret.clone(),
        }
    }
}
