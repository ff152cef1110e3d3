use crate::tasks::key_rotation::KeyRotationConfig;
use base64::{engine::general_purpose, Engine as _};
use secrecy::SecretBox;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Default RSA modulus size in bits.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest RSA modulus accepted for signing keys.
pub const MIN_KEY_BITS: usize = 2048;

/// Largest RSA modulus accepted for signing keys (ring's verification limit).
pub const MAX_KEY_BITS: usize = 8192;

/// Default validity window of a freshly generated key (24 hours).
pub const DEFAULT_KEY_VALIDITY_SECONDS: i64 = 86_400;

/// Default lifetime of a normally issued token (1 hour).
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;

/// Upper bound for every configured duration (10 years).
pub const MAX_DURATION_SECONDS: i64 = 10 * 365 * 86_400;

pub const DEFAULT_TOKEN_ISSUER: &str = "exampleIssuer";
pub const DEFAULT_TOKEN_SUBJECT: &str = "exampleSubject";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://totally_not_my_privateKeys.db?mode=rwc";

/// Which KeyStore implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(ConfigError::InvalidValue {
                var: "KEY_STORE".to_string(),
                reason: format!("unknown backend '{}' (expected memory or sqlite)", other),
            }),
        }
    }
}

/// Parameters for generating signing keys.
#[derive(Debug, Clone)]
pub struct KeyPolicy {
    pub key_bits: usize,
    pub key_validity_seconds: i64,
    /// Seed an already-expired key at bootstrap so `/auth?expired=true` works.
    pub seed_expired_key: bool,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            key_validity_seconds: DEFAULT_KEY_VALIDITY_SECONDS,
            seed_expired_key: true,
        }
    }
}

/// Static claims stamped into every issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTemplate {
    pub issuer: String,
    pub subject: String,
    pub ttl_seconds: i64,
}

impl Default for TokenTemplate {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_TOKEN_ISSUER.to_string(),
            subject: DEFAULT_TOKEN_SUBJECT.to_string(),
            ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub bind_address: String,
    pub store_backend: StoreBackend,
    pub database_url: String,
    /// 32-byte key sealing private keys at rest (SQLite backend only).
    pub master_key: Option<SecretBox<Vec<u8>>>,
    pub key_policy: KeyPolicy,
    pub token_template: TokenTemplate,
    pub rotation: KeyRotationConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("Invalid master key format: {0}")]
    InvalidMasterKey(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

fn parse_var<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Durations are added to timestamps, so they must stay well inside
/// chrono's range.
fn bounded_seconds(name: &str, value: i64, min: i64) -> Result<i64, ConfigError> {
    if !(min..=MAX_DURATION_SECONDS).contains(&value) {
        return Err(ConfigError::InvalidValue {
            var: name.to_string(),
            reason: format!(
                "must be between {} and {}, got {}",
                min, MAX_DURATION_SECONDS, value
            ),
        });
    }
    Ok(value)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let store_backend = match vars.get("KEY_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Memory,
        };

        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let master_key = match vars.get("JWKS_MASTER_KEY") {
            Some(encoded) => {
                let decoded = general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(ConfigError::Base64Error)?;
                if decoded.len() != 32 {
                    return Err(ConfigError::InvalidMasterKey(format!(
                        "Expected 32 bytes, got {}",
                        decoded.len()
                    )));
                }
                Some(SecretBox::new(Box::new(decoded)))
            }
            None => None,
        };

        let key_bits = parse_var(vars, "KEY_BITS", DEFAULT_KEY_BITS)?;
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&key_bits) {
            return Err(ConfigError::InvalidValue {
                var: "KEY_BITS".to_string(),
                reason: format!(
                    "must be between {} and {}, got {}",
                    MIN_KEY_BITS, MAX_KEY_BITS, key_bits
                ),
            });
        }

        let key_policy = KeyPolicy {
            key_bits,
            key_validity_seconds: bounded_seconds(
                "KEY_VALIDITY_SECONDS",
                parse_var(vars, "KEY_VALIDITY_SECONDS", DEFAULT_KEY_VALIDITY_SECONDS)?,
                1,
            )?,
            seed_expired_key: parse_var(vars, "SEED_EXPIRED_KEY", true)?,
        };

        let token_template = TokenTemplate {
            issuer: vars
                .get("TOKEN_ISSUER")
                .cloned()
                .unwrap_or_else(|| DEFAULT_TOKEN_ISSUER.to_string()),
            subject: vars
                .get("TOKEN_SUBJECT")
                .cloned()
                .unwrap_or_else(|| DEFAULT_TOKEN_SUBJECT.to_string()),
            ttl_seconds: bounded_seconds(
                "TOKEN_TTL_SECONDS",
                parse_var(vars, "TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS)?,
                1,
            )?,
        };

        let defaults = KeyRotationConfig::default();
        let check_interval_seconds = bounded_seconds(
            "ROTATION_CHECK_INTERVAL_SECONDS",
            parse_var(
                vars,
                "ROTATION_CHECK_INTERVAL_SECONDS",
                defaults.check_interval_seconds as i64,
            )?,
            1,
        )? as u64;
        let retention_seconds = match vars.get("KEY_RETENTION_SECONDS") {
            Some(_) => Some(bounded_seconds(
                "KEY_RETENTION_SECONDS",
                parse_var(vars, "KEY_RETENTION_SECONDS", 0)?,
                1,
            )?),
            None => None,
        };
        let rotation = KeyRotationConfig {
            check_interval_seconds,
            lead_seconds: bounded_seconds(
                "ROTATION_LEAD_SECONDS",
                parse_var(vars, "ROTATION_LEAD_SECONDS", defaults.lead_seconds)?,
                0,
            )?,
            retention_seconds,
        };

        Ok(Config {
            bind_address,
            store_backend,
            database_url,
            master_key,
            key_policy,
            token_template,
            rotation,
        })
    }
}
