pub mod admin;

use crate::{ApiError, ApiResult, AppState};
use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response}
};

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let open_circuits = state
        .breaker
        .snapshot()
        .values()
        .filter(|c| c.state == resilience::CircuitState::Open)
        .count();
    let metrics = if state.metrics.is_some() {
        "enabled"
    } else {
        "disabled"
    };

    Json(serde_json::json!({
        "status": "healthy",
        "checks": {
            "metrics": metrics,
            "open_circuits": open_circuits
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("metrics exporter is disabled".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render()
    )
        .into_response())
}
