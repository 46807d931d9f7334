//! Health and metrics endpoints.
//!
//! Provides:
//! - Liveness probes: `/health`, `/healthz`
//! - Readiness probes: `/ready`, `/readyz` (pings the API server)
//! - Prometheus metrics: `/metrics`

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use kube::Client;
use serde_json::{json, Value};

/// Shared state for the probe handlers.
#[derive(Clone)]
pub struct HealthState {
    pub name: &'static str,
    pub version: &'static str,
    pub client: Client,
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Liveness: OK whenever the server responds.
async fn health_handler(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "name": state.name,
        "version": state.version,
    }))
}

/// Readiness: the API server must be reachable.
async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.client.apiserver_version().await {
        Ok(version) => Ok(Json(json!({
            "status": "ready",
            "apiserver": format!("{}.{}", version.major, version.minor),
        }))),
        Err(error) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "error": error.to_string(),
            })),
        )),
    }
}

async fn metrics_handler() -> String {
    observability::render_metrics()
}
