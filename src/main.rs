//! Workflow bot
//!
//! A Telegram bot that walks allow-listed users through choosing a branch,
//! a workflow mode and an application version, then dispatches the
//! repository's CI workflow with those inputs.

mod access;
mod api;
mod command;
mod config;
mod github;
mod runtime;
mod state_machine;
mod telegram;

use access::AccessGuard;
use api::{create_router, AppState};
use config::{Config, TransportMode};
use github::{GitHubClient, LoggingRepoClient};
use runtime::{RuntimeManager, RuntimeSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workflow_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(config = ?config, "Configuration loaded");

    let guard = AccessGuard::new(config.allowed_users.iter().copied());
    if guard.is_empty() {
        tracing::warn!("RESTRICTED_IDS is empty; every workflow request will be denied");
    }

    let repo = LoggingRepoClient::new(GitHubClient::new(
        &config.repo_url,
        config.repo_token.clone(),
        config.workflow_file.clone(),
        config.http_timeout,
    )?);
    let chat = Arc::new(TelegramClient::new(
        &config.telegram_api_url,
        &config.bot_token,
        config.http_timeout,
    )?);

    let runtime = Arc::new(RuntimeManager::new(
        guard,
        Arc::new(repo),
        chat.clone(),
        RuntimeSettings {
            app_name: config.app_name.clone(),
            session_ttl: config.session_ttl,
        },
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    match config.transport {
        TransportMode::Polling => {
            telegram::run_polling(&chat, &runtime, config.poll_timeout, shutdown).await;
        }
        TransportMode::Webhook => {
            let app = create_router(AppState::new(runtime, config.webhook_secret.clone()));
            let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
            tracing::info!("Webhook server listening on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;
        }
    }

    tracing::info!("Bot stopped");
    Ok(())
}
