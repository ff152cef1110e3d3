use chrono::{DateTime, Duration, Utc};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// RSA signing key pair with its validity window.
///
/// The public half is always derived from the private half at construction,
/// so the two can never disagree. Fields are private; a pair is immutable
/// once built.
#[derive(Clone)]
pub struct KeyPair {
    kid: String,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    not_after: DateTime<Utc>,
}

impl KeyPair {
    pub fn new(kid: impl Into<String>, private_key: RsaPrivateKey, not_after: DateTime<Utc>) -> Self {
        let public_key = private_key.to_public_key();
        Self {
            kid: kid.into(),
            private_key,
            public_key,
            not_after,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// A key is valid while `now` is strictly before `not_after`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_after > now
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_valid_at(now)
    }
}

/// `at` shifted by `seconds` (negative shifts back), or `None` when the
/// result falls outside chrono's representable range.
pub fn offset_by_seconds(at: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(seconds).and_then(|delta| at.checked_add_signed(delta))
}

/// Redacts private key material.
impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .field("private_key", &"[REDACTED]")
            .field("not_after", &self.not_after)
            .finish()
    }
}

/// Row of the `keys` table.
#[derive(Debug, Clone, FromRow)]
pub struct KeyRecord {
    pub kid: String,
    pub key: Vec<u8>,
    pub exp: i64,
}

/// Token endpoint response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// JWKS response (RFC 7517)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<JsonWebKey>,
}

/// RSA JSON Web Key (RFC 7517 / RFC 7518 §6.3.1), public members only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kid: String, // Key ID
    pub alg: String, // Algorithm ("RS256")
    pub kty: String, // Key Type ("RSA")
    #[serde(rename = "use")]
    pub use_: String, // Public key use ("sig")
    pub n: String,   // Modulus (base64url, big-endian, no padding)
    pub e: String,   // Exponent (base64url, big-endian, no padding)
}

/// Readiness check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub signing_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
