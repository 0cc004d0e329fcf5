use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

use crate::config::AppConfig;
use crate::poller::PollController;
use crate::utils::error::Result;

pub mod handlers;
pub mod responses;

pub use handlers::{health_check, list_items, run_cycle_now, track_item, untrack_item};
pub use responses::{ApiError, ApiResponse, AppError};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<PollController>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new().level(Level::INFO),
                        ),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(track_item))
        .route("/items/:id", delete(untrack_item))
        .route("/cycle", post(run_cycle_now))
}

/// Binds the API server and serves until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!("Server starting on {}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
