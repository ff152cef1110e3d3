//! Observability for the JWKS service.
//!
//! # Privacy by Default
//!
//! Instrumented functions use `#[instrument(skip_all)]` and name their safe
//! fields explicitly (`kid`, `status`, `key_selection`). Tokens, private key
//! material and master keys never appear in logs or metric labels.

pub mod metrics;

use crate::errors::JwksError;

/// Error categories for metric labels (bounded cardinality).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No key matching the requested selection
    KeyUnavailable,
    /// Key generation, signing or at-rest encryption failed
    Cryptographic,
    /// Key store failures, including duplicate ids
    Storage,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::KeyUnavailable => "key_unavailable",
            ErrorCategory::Cryptographic => "cryptographic",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&JwksError> for ErrorCategory {
    fn from(err: &JwksError) -> Self {
        match err {
            JwksError::NoValidKey | JwksError::NoExpiredKey => ErrorCategory::KeyUnavailable,
            JwksError::KeyGeneration(_) | JwksError::Signing(_) | JwksError::Crypto(_) => {
                ErrorCategory::Cryptographic
            }
            JwksError::Database(_) | JwksError::DuplicateKeyId(_) => ErrorCategory::Storage,
            JwksError::Encoding(_) | JwksError::Internal => ErrorCategory::Internal,
        }
    }
}

/// Count a request-level error under `operation`.
pub fn record_error(operation: &str, err: &JwksError) {
    metrics::record_error(
        operation,
        ErrorCategory::from(err).as_str(),
        err.status_code().as_u16(),
    );
}
