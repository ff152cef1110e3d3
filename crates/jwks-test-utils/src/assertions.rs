//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for issued tokens. Signature checks use
//! `jsonwebtoken` directly against the published JWK components, so they do
//! not share a code path with the service's own helpers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use jwks_service::models::{JsonWebKey, Jwks};
use serde::Deserialize;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
    #[serde(default)]
    pub kid: Option<String>,
}

/// JWT claims structure
#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing segment {}", index));
    URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {}: {}", index, e))
}

fn header(token: &str) -> JwtHeader {
    serde_json::from_slice(&segment(token, 0)).expect("Failed to parse JWT header")
}

fn claims(token: &str) -> JwtClaims {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse JWT claims")
}

/// Verify `token` against one JWK. `Err` carries the rejection reason.
pub fn verify_with_jwk(token: &str, jwk: &JsonWebKey, validate_exp: bool) -> Result<(), String> {
    let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|e| e.to_string())?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;
    validation.validate_exp = validate_exp;
    if !validate_exp {
        validation.required_spec_claims.clear();
    }

    decode::<serde_json::Value>(token, &key, &validation)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt()
///     .assert_signed_by("k1")
///     .assert_expires_in(3600)
///     .assert_verifies_against(&jwks);
/// ```
pub trait TokenAssertions {
    /// Assert RS256 JWT structure with a `kid` header and the four claims
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the header `kid`
    fn assert_signed_by(&self, key_id: &str) -> &Self;

    /// Assert `exp` is about `seconds` from now (5 s tolerance)
    fn assert_expires_in(&self, seconds: i64) -> &Self;

    /// Assert `exp` is strictly before `iat` and before now
    fn assert_expired_claims(&self) -> &Self;

    fn assert_issuer(&self, issuer: &str) -> &Self;

    fn assert_for_subject(&self, subject: &str) -> &Self;

    /// Assert the JWKS publishes the token's `kid` and the signature and
    /// `exp` both check out against that key
    fn assert_verifies_against(&self, jwks: &Jwks) -> &Self;

    /// Assert no key in the JWKS accepts the token with `exp` enforced
    fn assert_rejected_by(&self, jwks: &Jwks) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts: Vec<_> = self.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts.len()
        );

        let header = header(self);
        assert_eq!(header.alg, "RS256", "Expected RS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");
        assert!(header.kid.is_some(), "JWT header has no kid");

        // Parsing enforces all four claims are present
        claims(self);

        self
    }

    fn assert_signed_by(&self, key_id: &str) -> &Self {
        let kid = header(self).kid;
        assert_eq!(
            kid.as_deref(),
            Some(key_id),
            "Expected key_id '{}', got {:?}",
            key_id,
            kid
        );

        self
    }

    fn assert_expires_in(&self, seconds: i64) -> &Self {
        let expires_in = claims(self).exp - chrono::Utc::now().timestamp();

        assert!(
            (expires_in - seconds).abs() <= 5,
            "Expected token to expire in {} seconds, but expires in {} seconds",
            seconds,
            expires_in
        );

        self
    }

    fn assert_expired_claims(&self) -> &Self {
        let claims = claims(self);
        let now = chrono::Utc::now().timestamp();

        assert!(
            claims.exp < claims.iat,
            "Expected exp ({}) before iat ({})",
            claims.exp,
            claims.iat
        );
        assert!(claims.exp < now, "Expected exp ({}) before now ({})", claims.exp, now);

        self
    }

    fn assert_issuer(&self, issuer: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.iss, issuer,
            "Expected issuer '{}', got '{}'",
            issuer, claims.iss
        );

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.sub, subject,
            "Expected subject '{}', got '{}'",
            subject, claims.sub
        );

        self
    }

    fn assert_verifies_against(&self, jwks: &Jwks) -> &Self {
        let kid = header(self).kid.expect("JWT header has no kid");
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .unwrap_or_else(|| panic!("kid '{}' is not published in the JWKS", kid));

        if let Err(e) = verify_with_jwk(self, jwk, true) {
            panic!("Token did not verify against kid '{}': {}", kid, e);
        }

        self
    }

    fn assert_rejected_by(&self, jwks: &Jwks) -> &Self {
        for jwk in &jwks.keys {
            assert!(
                verify_with_jwk(self, jwk, true).is_err(),
                "Token unexpectedly verified against kid '{}'",
                jwk.kid
            );
        }

        self
    }
}
