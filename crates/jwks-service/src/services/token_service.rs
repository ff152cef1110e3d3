use crate::config::TokenTemplate;
use crate::crypto::{self, Claims};
use crate::errors::JwksError;
use crate::models::{self, KeyPair};
use crate::observability::metrics;
use crate::repositories::KeyStore;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::instrument;

/// How far in the past `exp` lands for deliberately expired claims.
const EXPIRED_CLAIM_OFFSET_SECONDS: i64 = 3600;

/// Which key signs the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySelection {
    /// First key still valid at `now`.
    Valid,
    /// First key whose validity ended at or before `now`. No fallback.
    Expired,
}

impl KeySelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySelection::Valid => "valid",
            KeySelection::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueOptions {
    pub key: KeySelection,
    /// Backdate `exp` to before `now`.
    pub expired_claims: bool,
}

impl IssueOptions {
    /// Map the `expired` request flag onto both knobs: an expired signing
    /// key and an `exp` already in the past.
    pub fn from_expired_flag(expired: bool) -> Self {
        if expired {
            Self {
                key: KeySelection::Expired,
                expired_claims: true,
            }
        } else {
            Self::default()
        }
    }
}

impl Default for IssueOptions {
    fn default() -> Self {
        Self {
            key: KeySelection::Valid,
            expired_claims: false,
        }
    }
}

/// A signed JWT plus the facts a caller may want without decoding it.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub kid: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a token from `template` with the key picked by `options`.
#[instrument(skip_all, fields(key_selection = options.key.as_str(), expired_claims = options.expired_claims))]
pub async fn issue_token(
    store: &dyn KeyStore,
    template: &TokenTemplate,
    options: IssueOptions,
    now: DateTime<Utc>,
) -> Result<SignedToken, JwksError> {
    let start = Instant::now();
    let result = sign_with_selected_key(store, template, options, now).await;

    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_token_issuance(options.key.as_str(), status, start.elapsed());

    result
}

async fn sign_with_selected_key(
    store: &dyn KeyStore,
    template: &TokenTemplate,
    options: IssueOptions,
    now: DateTime<Utc>,
) -> Result<SignedToken, JwksError> {
    let key_pair = select_key(store, options.key, now).await?;

    let offset = if options.expired_claims {
        -EXPIRED_CLAIM_OFFSET_SECONDS
    } else {
        template.ttl_seconds
    };
    let expires_at = models::offset_by_seconds(now, offset).ok_or_else(|| {
        JwksError::Signing(format!("Token expiry out of range: now + {}s", offset))
    })?;

    let claims = Claims {
        iss: template.issuer.clone(),
        sub: template.subject.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = crypto::sign_jwt(&claims, key_pair.private_key(), key_pair.kid())?;
    tracing::debug!(kid = %key_pair.kid(), "Issued token");

    Ok(SignedToken {
        token,
        kid: key_pair.kid().to_string(),
        expires_at,
    })
}

async fn select_key(
    store: &dyn KeyStore,
    selection: KeySelection,
    now: DateTime<Utc>,
) -> Result<KeyPair, JwksError> {
    match selection {
        KeySelection::Valid => store
            .list_valid(now)
            .await?
            .into_iter()
            .next()
            .ok_or(JwksError::NoValidKey),
        KeySelection::Expired => store
            .list_all()
            .await?
            .into_iter()
            .find(|k| k.is_expired_at(now))
            .ok_or(JwksError::NoExpiredKey),
    }
}
