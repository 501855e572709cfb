//! HTTP routes for the gateway auth service.

use crate::handlers::auth_handler::{self, AppState};
use crate::handlers::{health_handler, jwks_handler};
use crate::middleware::http_metrics_middleware;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Build the application routes.
///
/// - `POST /api/v1/auth/token` - Password login
/// - `POST /api/v1/auth/refresh` - Refresh token exchange
/// - `GET /.well-known/jwks.json` - Public signing key
/// - `/health`, `/ready`, `/metrics` - Operational endpoints, unversioned
///
/// Layers, innermost first: request timeout, tracing, HTTP metrics.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/api/v1/auth/token", post(auth_handler::handle_token))
        .route("/api/v1/auth/refresh", post(auth_handler::handle_refresh))
        .route("/.well-known/jwks.json", get(jwks_handler::handle_get_jwks))
        .route("/health", get(health_handler::health_check))
        .route("/ready", get(health_handler::readiness_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(health_handler::metrics_handler))
        .with_state(metrics_handle);

    app_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
