use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::{ApiResponse, AppError, AppState};
use crate::models::{NewTrackedItem, TrackedItem};
use crate::poller::CycleSummary;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "restock-watcher",
        "poll_interval": state.config.scheduler.poll_interval,
        "tracked_items": state.controller.items().await.len(),
    }))
}

pub async fn list_items(State(state): State<AppState>) -> Json<ApiResponse<Vec<TrackedItem>>> {
    let items = state.controller.items().await;
    Json(ApiResponse::success(items))
}

pub async fn track_item(
    State(state): State<AppState>,
    Json(request): Json<NewTrackedItem>,
) -> Result<(StatusCode, Json<ApiResponse<TrackedItem>>), AppError> {
    let item = state.controller.track(request).await?;
    tracing::info!("Tracked item via API: {} (size {})", item.id, item.target_size);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

pub async fn untrack_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TrackedItem>>, AppError> {
    let removed = state.controller.untrack(&id).await?;
    tracing::info!("Untracked item via API: {}", id);
    Ok(Json(ApiResponse::success(removed)))
}

/// Triggers a poll cycle outside the schedule and waits for its summary.
/// Responds 409 when a cycle is already in flight.
pub async fn run_cycle_now(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CycleSummary>>, AppError> {
    match state.controller.run_cycle().await {
        Some(summary) => Ok(Json(ApiResponse::success(summary))),
        None => Err(AppError::conflict("A poll cycle is already running")),
    }
}
