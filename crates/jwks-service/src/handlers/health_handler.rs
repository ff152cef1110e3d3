//! Health check handlers.
//!
//! - `/health`: liveness, returns OK while the process runs
//! - `/ready`: readiness, requires at least one valid signing key

use crate::models::ReadyResponse;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;

use super::auth_handler::AppState;

/// Liveness check handler. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// 200 when a valid signing key exists, 503 otherwise. Store errors are
/// logged server-side; the response stays generic.
#[tracing::instrument(skip_all, name = "jwks.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list_valid(Utc::now()).await {
        Ok(valid) if !valid.is_empty() => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready".to_string(),
                signing_key: "available".to_string(),
                error: None,
            }),
        ),
        Ok(_) => {
            tracing::warn!("Readiness check failed: no valid signing key");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "not_ready".to_string(),
                    signing_key: "unavailable".to_string(),
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::warn!("Readiness check failed: key store error: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "not_ready".to_string(),
                    signing_key: "unknown".to_string(),
                    error: Some("Key store unavailable".to_string()),
                }),
            )
        }
    }
}
