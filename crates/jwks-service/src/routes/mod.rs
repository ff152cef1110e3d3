//! HTTP routes for the JWKS service.

use crate::handlers::{auth_handler, health_handler, jwks_handler, metrics_handler, AppState};
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

pub use crate::observability::metrics::init_metrics_recorder;

/// Build the application routes.
///
/// - `/.well-known/jwks.json`, `/jwks` - public key set
/// - `/auth` - token issuance (POST only)
/// - `/health`, `/ready` - liveness and readiness
/// - `/metrics` - Prometheus scrape
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        // RFC 8414 well-known path plus the short alias
        .route("/.well-known/jwks.json", get(jwks_handler::handle_get_jwks))
        .route("/jwks", get(jwks_handler::handle_get_jwks))
        .route("/auth", post(auth_handler::handle_issue_token))
        .route("/health", get(health_handler::health_check))
        .route("/ready", get(health_handler::readiness_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees 404/405 too)
    app_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
