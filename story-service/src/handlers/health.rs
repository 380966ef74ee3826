use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe, reports cache reachability.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check().await;

    if report.is_healthy() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "story-service",
                "version": env!("CARGO_PKG_VERSION"),
                "cache": report.cache,
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "story-service",
                "cache": report.cache,
                "error": report.error,
            })),
        )
    }
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.health.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
