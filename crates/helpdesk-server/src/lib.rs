//! HTTP surface for the helpdesk bot.
//!
//! # Endpoints
//!
//! - `GET /`, `GET /health` - status
//! - `POST /process-email` - run one email through the pipeline
//! - `GET|POST /email-webhook` - mailbox subscription validation and change notifications
//! - `POST /interactions` - chat slash commands

pub mod discord;
pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use discord::DiscordApi;
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/process-email", post(routes::process_email))
        .route(
            "/email-webhook",
            get(routes::validate_subscription).post(routes::email_notification),
        )
        .route("/interactions", post(discord::interactions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve(
    state: Arc<AppState>,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "helpdesk server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
