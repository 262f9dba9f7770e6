// Membership Tracker - Webhook Server
// Telegram webhook instead of long polling, plus a small status API

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use clap::Parser;
use membership_tracker::{
    bot, init_tracing, App, Config, DailySchedule, Messenger, TelegramClient, Update,
    DEFAULT_LOG_FILTER,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "Membership tracker webhook server")]
struct Cli {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    bind: String,

    #[command(flatten)]
    config: Config,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    app: Arc<App>,
    messenger: Arc<dyn Messenger>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(serde_json::json!({
        "status": "OK",
        "version": membership_tracker::VERSION,
        "sources": state.app.sources.len(),
    })))
}

/// GET /api/status/:query - Plain-text status report, same text as `/check`
async fn get_status(State(state): State<AppState>, Path(query): Path<String>) -> impl IntoResponse {
    state.app.check(&query).await
}

/// POST /telegram/webhook - One Bot API update
///
/// Always answers 200 so Telegram does not redeliver; reply failures are
/// logged by the bot layer.
async fn telegram_webhook(State(state): State<AppState>, Json(update): Json<Update>) -> impl IntoResponse {
    bot::handle_update(&state.app, state.messenger.as_ref(), &update).await;
    StatusCode::OK
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/status/:query", get(get_status));

    Router::new()
        .nest("/api", api_routes)
        .route("/telegram/webhook", post(telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(&format!("{},tower_http=info", DEFAULT_LOG_FILTER));

    let cli = Cli::parse();
    let config = cli.config;
    let client = reqwest::Client::new();

    let token = config.require_bot_token()?;
    let chat = config.require_notify_chat()?.to_string();
    let telegram = Arc::new(TelegramClient::new(client.clone(), &config.telegram_api_base, token));
    let app = Arc::new(App::from_config(&config, client));

    let schedule = DailySchedule::new(config.check_times.clone(), config.timezone);
    let handles = schedule.spawn({
        let app = Arc::clone(&app);
        let telegram = Arc::clone(&telegram);
        move |now| {
            let app = Arc::clone(&app);
            let telegram = Arc::clone(&telegram);
            let chat = chat.clone();
            async move {
                app.notifier
                    .run_scheduled(&app.sources, telegram.as_ref(), &chat, now)
                    .await;
            }
        }
    });

    let state = AppState {
        app,
        messenger: telegram,
    };

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.bind))?;

    info!(addr = %cli.bind, "🚀 Webhook server running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    for handle in handles {
        handle.abort();
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
