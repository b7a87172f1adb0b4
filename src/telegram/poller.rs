//! Long-polling update loop

use super::TelegramClient;
use crate::runtime::{ChatClient, RepoClient, RuntimeManager};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Feed updates from `getUpdates` into the manager until cancelled.
///
/// The offset is advanced past every received update, including ones that
/// carry no text, so nothing is delivered twice.
pub async fn run_polling<R, C>(
    client: &TelegramClient,
    manager: &RuntimeManager<R, C>,
    poll_timeout: Duration,
    cancel: CancellationToken,
) where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    tracing::info!(poll_timeout_secs = poll_timeout.as_secs(), "Polling for updates");

    let mut offset: Option<i64> = None;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = client.get_updates(offset, poll_timeout) => result,
        };

        match result {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(message) = update.into_inbound() {
                        manager.handle_message(message).await;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, retry_in_secs = backoff.as_secs(), "getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    tracing::info!("Polling stopped");
}
