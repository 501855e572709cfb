//! Liveness, readiness and metrics endpoints.
//!
//! - `/health`: process is up; checks nothing
//! - `/ready`: refresh token store is reachable
//! - `/metrics`: Prometheus exposition

use crate::models::ReadinessResponse;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use super::auth_handler::AppState;

pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 when the store answers a ping, 503 otherwise. The store error
/// is only logged; the response stays generic.
#[tracing::instrument(skip_all, name = "ga.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.token_service.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                store: "healthy",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "gateway_auth::health", error = %e, "Readiness check failed: refresh token store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    store: "unhealthy",
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}

pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
