//! HTTP surface
//!
//! - POST /webhook - Telegram update delivery
//! - GET /health - Liveness, independent of session store health

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::bot::telegram::{TelegramBot, Update};
use crate::config::ServerConfig;
use crate::orchestrator::Orchestrator;

/// Header Telegram uses to echo the webhook secret
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub bot: TelegramBot,
    pub orchestrator: Arc<Orchestrator>,
    pub webhook_secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Response {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(secret.as_str()) {
            warn!("Rejected webhook call with a missing or wrong secret token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"status": "unauthorized"})),
            )
                .into_response();
        }
    }

    // Processing runs in its own task so a dropped request can't cancel a turn
    let update_id = update.update_id;
    let bot = state.bot.clone();
    let orchestrator = Arc::clone(&state.orchestrator);
    let task = tokio::spawn(async move { bot.process_update(&orchestrator, update).await });

    if let Err(e) = task.await {
        error!(update_id, "Update processing task failed: {}", e);
        // Telegram retries on a 5xx; the retry must not be dropped as a duplicate
        state.bot.forget_update(update_id).await;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error"})),
        )
            .into_response();
    }

    Json(json!({"status": "success"})).into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "healthy", "service": "Wizzy Bot"}))
}

/// Serve until Ctrl-C
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Webhook server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Webhook server shutting down gracefully");
        })
        .await
        .context("Server error")?;

    Ok(())
}
