use crate::config::TokenTemplate;
use crate::errors::JwksError;
use crate::models::TokenResponse;
use crate::observability;
use crate::repositories::KeyStore;
use crate::services::token_service::{self, IssueOptions};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyStore>,
    pub token_template: TokenTemplate,
}

/// Query string of `POST /auth`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub expired: Option<String>,
}

impl AuthQuery {
    /// `?expired`, `?expired=1` and `?expired=true` (any case) are set.
    pub fn wants_expired(&self) -> bool {
        match self.expired.as_deref() {
            None => false,
            Some(value) => value.is_empty() || value == "1" || value.eq_ignore_ascii_case("true"),
        }
    }
}

/// Handle token request
///
/// POST /auth[?expired=true]
///
/// The request body is ignored. With `expired` set, the token is signed by
/// an expired key and carries an `exp` in the past.
#[instrument(name = "jwks.auth.issue", skip_all, fields(expired, status))]
pub async fn handle_issue_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthQuery>,
) -> Result<Json<TokenResponse>, JwksError> {
    let expired = query.wants_expired();
    tracing::Span::current().record("expired", expired);

    let result = token_service::issue_token(
        state.store.as_ref(),
        &state.token_template,
        IssueOptions::from_expired_flag(expired),
        Utc::now(),
    )
    .await;

    let status = if result.is_ok() { "success" } else { "error" };
    tracing::Span::current().record("status", status);

    match result {
        Ok(signed) => Ok(Json(TokenResponse {
            token: signed.token,
        })),
        Err(e) => {
            observability::record_error("issue_token", &e);
            Err(e)
        }
    }
}
