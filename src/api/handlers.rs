//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse};
use super::{AppState, SECRET_TOKEN_HEADER};
use crate::runtime::{ChatClient, RepoClient};
use crate::telegram::types::Update;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

/// Create the webhook router
pub fn create_router<R, C>(state: AppState<R, C>) -> Router
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    Router::new()
        .route("/telegram", post(receive_update::<R, C>))
        .route("/health", get(health::<R, C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Accept one update. Anything that passes the secret check is acknowledged
/// with 200 so Telegram does not redeliver it.
async fn receive_update<R, C>(
    State(state): State<AppState<R, C>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Response
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    if let Some(expected) = &state.webhook_secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_ref()) {
            tracing::warn!(update_id = update.update_id, "Webhook call with bad secret token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("invalid secret token")),
            )
                .into_response();
        }
    }

    let update_id = update.update_id;
    match update.into_inbound() {
        Some(message) => state.runtime.handle_message(message).await,
        None => tracing::debug!(update_id, "Skipping update without text"),
    }
    StatusCode::OK.into_response()
}

async fn health<R, C>(State(state): State<AppState<R, C>>) -> Json<HealthResponse>
where
    R: RepoClient + 'static,
    C: ChatClient + 'static,
{
    Json(HealthResponse {
        status: "ok",
        active_conversations: state.runtime.active_runtimes().await,
        sessions_in_progress: state.runtime.sessions_in_progress().await,
    })
}
