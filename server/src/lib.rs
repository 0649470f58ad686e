//! # Admin Server
//!
//! HTTP surface for operators:
//!
//! - `GET /health`
//! - `GET /metrics` (Prometheus text exposition)
//! - `GET|POST /admin/rate-limits`
//! - `GET /admin/circuits`

pub mod errors;
pub mod routes;

pub use errors::{ApiError, ApiResult};

use axum::{
    Router,
    routing::get
};
use config::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use resilience::{CircuitBreaker, RateLimiter};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub breaker: Arc<CircuitBreaker>,
    pub metrics: Option<PrometheusHandle>
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            limiter,
            breaker,
            metrics: None
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_handler))
        .route("/metrics", get(routes::metrics_handler))
        .route(
            "/admin/rate-limits",
            get(routes::admin::get_rate_limits).post(routes::admin::update_rate_limits)
        )
        .route("/admin/circuits", get(routes::admin::get_circuits))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `host:port` and serves until the task is dropped.
pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Admin server listening on {}", addr);
    axum::serve(listener, create_router(state)).await
}
