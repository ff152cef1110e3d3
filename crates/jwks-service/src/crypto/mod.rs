use crate::config::{MAX_KEY_BITS, MIN_KEY_BITS};
use crate::errors::JwksError;
use crate::models::{JsonWebKey, KeyPair};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    rand::{SecureRandom, SystemRandom},
};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// JWS algorithm used for every issued token and published key.
pub const JWT_ALGORITHM: &str = "RS256";

/// JWK key type for the RSA family.
pub const JWK_KEY_TYPE: &str = "RSA";

/// JWK public key use.
pub const JWK_USE_SIGNATURE: &str = "sig";

/// Tokens larger than this are rejected before any parsing.
const MAX_JWT_SIZE_BYTES: usize = 8192;

/// AES-GCM authentication tag length.
const TAG_LEN: usize = 16;

/// JWT Claims structure.
///
/// A custom Debug implementation redacts `sub`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String, // Issuer
    pub sub: String, // Subject
    pub iat: i64,    // Issued at timestamp
    pub exp: i64,    // Expiration timestamp
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

/// Generate an RSA private key of `bits` modulus using the OS CSPRNG
#[instrument(skip_all, fields(bits = bits))]
pub fn generate_private_key(bits: usize) -> Result<RsaPrivateKey, JwksError> {
    if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) {
        return Err(JwksError::KeyGeneration(format!(
            "Unsupported modulus size: {} (expected {}..={})",
            bits, MIN_KEY_BITS, MAX_KEY_BITS
        )));
    }

    RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| JwksError::KeyGeneration(format!("RSA generation failed: {}", e)))
}

/// Base64url encodings of the public modulus and exponent.
///
/// `BigUint::to_bytes_be` yields the minimal big-endian representation, so
/// there is never a leading zero byte.
pub fn public_key_components(public_key: &RsaPublicKey) -> (String, String) {
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    (n, e)
}

/// Project a key pair onto its public JWK.
pub fn public_jwk(key_pair: &KeyPair) -> JsonWebKey {
    let (n, e) = public_key_components(key_pair.public_key());
    JsonWebKey {
        kid: key_pair.kid().to_string(),
        alg: JWT_ALGORITHM.to_string(),
        kty: JWK_KEY_TYPE.to_string(),
        use_: JWK_USE_SIGNATURE.to_string(),
        n,
        e,
    }
}

/// Serialize a private key to PKCS#1 DER.
pub fn encode_private_key(private_key: &RsaPrivateKey) -> Result<SecretBox<Vec<u8>>, JwksError> {
    let der = private_key
        .to_pkcs1_der()
        .map_err(|e| JwksError::Encoding(format!("Private key encoding failed: {}", e)))?;
    Ok(SecretBox::new(Box::new(der.as_bytes().to_vec())))
}

/// Parse a PKCS#1 DER private key.
pub fn decode_private_key(der: &[u8]) -> Result<RsaPrivateKey, JwksError> {
    RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|e| JwksError::Crypto(format!("Private key decoding failed: {}", e)))
}

/// Sign JWT with an RSA private key (RS256), stamping `kid` into the header
#[instrument(skip_all)]
pub fn sign_jwt(
    claims: &Claims,
    private_key: &RsaPrivateKey,
    key_id: &str,
) -> Result<String, JwksError> {
    let der = private_key
        .to_pkcs1_der()
        .map_err(|e| JwksError::Signing(format!("Invalid private key state: {}", e)))?;
    let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some("JWT".to_string());
    header.kid = Some(key_id.to_string());

    encode(&header, claims, &encoding_key)
        .map_err(|e| JwksError::Signing(format!("JWT signing operation failed: {}", e)))
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// Returns `None` for oversized or malformed tokens, or when the header has
/// no string `kid`. The token MUST still be verified after looking up the key.
pub fn extract_jwt_kid(token: &str) -> Option<String> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        return None;
    }

    let mut parts = token.split('.');
    let header_b64 = parts.next()?;
    if parts.count() != 2 {
        return None;
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).ok()?;
    let header: serde_json::Value = serde_json::from_slice(&header_bytes).ok()?;

    header.get("kid")?.as_str().map(|s| s.to_string())
}

/// Verify an RS256 JWT against a published JWK.
///
/// Validates the signature and, when `validate_exp` is set, the `exp` claim
/// (zero leeway). The JWK's `kid` must match the token header's `kid`.
#[instrument(skip_all)]
pub fn verify_jwt(token: &str, jwk: &JsonWebKey, validate_exp: bool) -> Result<Claims, JwksError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        return Err(JwksError::Crypto("Token exceeds maximum size".to_string()));
    }

    if extract_jwt_kid(token).as_deref() != Some(jwk.kid.as_str()) {
        return Err(JwksError::Crypto("Token kid does not match key".to_string()));
    }

    let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
        .map_err(|e| JwksError::Crypto(format!("Invalid public key components: {}", e)))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;
    validation.validate_exp = validate_exp;
    if !validate_exp {
        validation.required_spec_claims.clear();
    }

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "crypto", error = %e, "Token verification failed");
        JwksError::Crypto(format!("Token verification failed: {}", e))
    })?;

    Ok(token_data.claims)
}

/// Seal a serialized private key with AES-256-GCM.
///
/// Output layout: `nonce (12) || ciphertext || tag (16)`.
#[instrument(skip_all)]
pub fn seal_private_key(plaintext: &[u8], master_key: &[u8]) -> Result<Vec<u8>, JwksError> {
    let sealing_key = aead_key(master_key)?;

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|e| JwksError::Crypto(format!("Nonce generation failed: {}", e)))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|e| JwksError::Crypto(format!("Encryption operation failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Open a blob produced by [`seal_private_key`].
#[instrument(skip_all)]
pub fn open_private_key(sealed: &[u8], master_key: &[u8]) -> Result<SecretBox<Vec<u8>>, JwksError> {
    let opening_key = aead_key(master_key)?;

    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(JwksError::Crypto(format!(
            "Sealed key too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce_part, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce_bytes: [u8; NONCE_LEN] = nonce_part
        .try_into()
        .map_err(|e| JwksError::Crypto(format!("Invalid nonce format: {}", e)))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = ciphertext.to_vec();
    let decrypted = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|e| JwksError::Crypto(format!("Decryption operation failed: {}", e)))?;

    Ok(SecretBox::new(Box::new(decrypted.to_vec())))
}

fn aead_key(master_key: &[u8]) -> Result<LessSafeKey, JwksError> {
    if master_key.len() != 32 {
        return Err(JwksError::Crypto(format!(
            "Invalid master key length: {} (expected 32)",
            master_key.len()
        )));
    }
    let unbound_key = UnboundKey::new(&AES_256_GCM, master_key)
        .map_err(|e| JwksError::Crypto(format!("Cipher key creation failed: {}", e)))?;
    Ok(LessSafeKey::new(unbound_key))
}

/// Serialize and (optionally) seal a private key for storage.
pub fn to_stored_key(
    private_key: &RsaPrivateKey,
    master_key: Option<&SecretBox<Vec<u8>>>,
) -> Result<Vec<u8>, JwksError> {
    let der = encode_private_key(private_key)?;
    match master_key {
        Some(master_key) => seal_private_key(der.expose_secret(), master_key.expose_secret()),
        None => Ok(der.expose_secret().clone()),
    }
}

/// Inverse of [`to_stored_key`].
pub fn from_stored_key(
    stored: &[u8],
    master_key: Option<&SecretBox<Vec<u8>>>,
) -> Result<RsaPrivateKey, JwksError> {
    match master_key {
        Some(master_key) => {
            let der = open_private_key(stored, master_key.expose_secret())?;
            decode_private_key(der.expose_secret())
        }
        None => decode_private_key(stored),
    }
}

/// A handful of 2048-bit keys generated once per test binary.
///
/// Unit tests cannot use `jwks-test-utils`: it links a separate build of
/// this crate, so its `KeyPair` is a different type here.
#[cfg(test)]
#[allow(clippy::expect_used, clippy::indexing_slicing)]
pub(crate) fn test_private_key(slot: usize) -> RsaPrivateKey {
    use std::sync::OnceLock;

    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    let keys = KEYS.get_or_init(|| {
        (0..3)
            .map(|_| generate_private_key(2048).expect("test key generation"))
            .collect()
    });
    keys[slot % keys.len()].clone()
}
