use crate::{ApiError, ApiResult, AppState};
use axum::{Json, extract::State};
use resilience::{CircuitSnapshot, RateLimitOverrides, RateLimitSnapshot};
use std::collections::BTreeMap;

pub async fn get_rate_limits(State(state): State<AppState>) -> Json<RateLimitSnapshot> {
    Json(state.limiter.snapshot())
}

/// Applies a partial override map and returns the new effective limits.
///
/// `null`, `0` and `""` remove an override.
pub async fn update_rate_limits(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>
) -> ApiResult<Json<RateLimitSnapshot>> {
    let overrides = RateLimitOverrides::from_json(&body).map_err(ApiError::InvalidRequest)?;
    tracing::info!(
        providers = overrides.providers.len(),
        models = overrides.models.len(),
        "Applying rate limit overrides"
    );
    Ok(Json(state.limiter.apply_overrides(&overrides)))
}

pub async fn get_circuits(State(state): State<AppState>) -> Json<BTreeMap<String, CircuitSnapshot>> {
    Json(state.breaker.snapshot())
}
