use crate::errors::JwksError;
use crate::models::Jwks;
use crate::observability::{self, metrics::record_jwks_request};
use crate::services::key_management_service;
use axum::{
    extract::State,
    http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

use super::auth_handler::AppState;

/// Handle JWKS request
///
/// GET /.well-known/jwks.json (also served at /jwks)
///
/// Returns the public half of every key still valid now (RFC 7517).
/// Serialization failures map to `JwksError::Encoding`.
#[instrument(name = "jwks.jwks.get", skip_all, fields(key_count, status))]
pub async fn handle_get_jwks(State(state): State<Arc<AppState>>) -> Result<Response, JwksError> {
    let result = key_management_service::get_jwks(state.store.as_ref(), Utc::now())
        .await
        .and_then(|jwks| encode_jwks(&jwks).map(|body| (jwks.keys.len(), body)));

    let status = if result.is_ok() { "success" } else { "error" };
    tracing::Span::current().record("status", status);
    record_jwks_request(status);

    let (key_count, body) = result.inspect_err(|e| observability::record_error("get_jwks", e))?;
    tracing::Span::current().record("key_count", key_count);

    // Verifiers may cache the set for 5 minutes
    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static("application/json")),
        (CACHE_CONTROL, HeaderValue::from_static("max-age=300")),
    ];

    Ok((headers, body).into_response())
}

fn encode_jwks(jwks: &Jwks) -> Result<Vec<u8>, JwksError> {
    serde_json::to_vec(jwks)
        .map_err(|e| JwksError::Encoding(format!("JWKS serialization failed: {}", e)))
}
