use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("Duplicate key id: {0}")]
    DuplicateKeyId(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("No valid signing key available")]
    NoValidKey,

    #[error("No expired signing key available")]
    NoExpiredKey,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error")]
    Internal,
}

impl JwksError {
    /// HTTP status this error maps to at the transport boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            JwksError::DuplicateKeyId(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for JwksError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            JwksError::DuplicateKeyId(_) => ("DUPLICATE_KEY_ID", "A key with this id already exists"),
            JwksError::KeyGeneration(_) => ("KEY_GENERATION_FAILED", "Failed to generate a signing key"),
            JwksError::NoValidKey => ("NO_VALID_KEY", "No valid signing key is available"),
            JwksError::NoExpiredKey => ("NO_EXPIRED_KEY", "No expired signing key is available"),
            JwksError::Signing(_) => ("SIGNING_FAILED", "Failed to sign the token"),
            JwksError::Encoding(_) => ("ENCODING_FAILED", "Failed to encode key material"),
            JwksError::Database(_) => ("DATABASE_ERROR", "An internal database error occurred"),
            JwksError::Crypto(_) => ("CRYPTO_ERROR", "An internal cryptographic error occurred"),
            JwksError::Internal => ("INTERNAL_ERROR", "An internal error occurred"),
        };

        // Internal detail stays in the logs; the client only sees the code.
        tracing::debug!(target: "jwks.errors", error = %self, code, "Request failed");

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        (self.status_code(), Json(error_response)).into_response()
    }
}
