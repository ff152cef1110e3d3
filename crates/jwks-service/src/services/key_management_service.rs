use crate::config::KeyPolicy;
use crate::crypto;
use crate::errors::JwksError;
use crate::models::{self, Jwks, KeyPair};
use crate::observability::metrics;
use crate::repositories::KeyStore;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

/// Generate a fresh RSA key pair with a random UUIDv4 `kid`.
///
/// Prime search runs on the blocking pool so request handlers sharing the
/// runtime are not stalled. The pair is returned unregistered; the caller
/// decides where it goes.
#[instrument(skip_all, fields(bits = bits))]
pub async fn generate_key_pair(
    bits: usize,
    not_after: DateTime<Utc>,
) -> Result<KeyPair, JwksError> {
    let result = tokio::task::spawn_blocking(move || crypto::generate_private_key(bits))
        .await
        .map_err(|e| JwksError::KeyGeneration(format!("Key generation task failed: {}", e)))
        .and_then(|generated| generated)
        .map(|private_key| KeyPair::new(Uuid::new_v4().to_string(), private_key, not_after));

    metrics::record_key_generation(if result.is_ok() { "success" } else { "error" });
    result
}

/// Populate an empty store at startup.
///
/// Registers one key valid for `key_validity_seconds` if no valid key exists.
/// With `seed_expired_key` set and no expired key present, also registers a
/// key that expired one second before `now`.
#[instrument(skip_all)]
pub async fn initialize_signing_keys(
    store: &dyn KeyStore,
    policy: &KeyPolicy,
    now: DateTime<Utc>,
) -> Result<(), JwksError> {
    let all = store.list_all().await?;

    if !all.iter().any(|k| k.is_valid_at(now)) {
        let not_after = validity_end(policy, now)?;
        let key_pair = generate_key_pair(policy.key_bits, not_after).await?;
        tracing::info!(kid = %key_pair.kid(), %not_after, "Registered initial signing key");
        store.put(key_pair).await?;
    }

    if policy.seed_expired_key && !all.iter().any(|k| k.is_expired_at(now)) {
        let not_after = models::offset_by_seconds(now, -1).ok_or_else(|| {
            JwksError::KeyGeneration("Expired seed timestamp out of range".to_string())
        })?;
        let key_pair = generate_key_pair(policy.key_bits, not_after).await?;
        tracing::info!(kid = %key_pair.kid(), "Registered expired signing key");
        store.put(key_pair).await?;
    }

    refresh_valid_key_gauge(store, now).await;
    Ok(())
}

/// Generate and register a new valid key. Existing keys are left alone.
#[instrument(skip_all)]
pub async fn rotate_signing_key(
    store: &dyn KeyStore,
    policy: &KeyPolicy,
    now: DateTime<Utc>,
) -> Result<String, JwksError> {
    let not_after = validity_end(policy, now)?;
    let key_pair = generate_key_pair(policy.key_bits, not_after).await?;
    let kid = key_pair.kid().to_string();

    store.put(key_pair).await?;
    tracing::info!(kid = %kid, %not_after, "Rotated signing key");

    refresh_valid_key_gauge(store, now).await;
    Ok(kid)
}

/// Public JWKS of every key still valid at `now`, in store order.
pub async fn get_jwks(store: &dyn KeyStore, now: DateTime<Utc>) -> Result<Jwks, JwksError> {
    let keys = store
        .list_valid(now)
        .await?
        .iter()
        .map(crypto::public_jwk)
        .collect();

    Ok(Jwks { keys })
}

fn validity_end(policy: &KeyPolicy, now: DateTime<Utc>) -> Result<DateTime<Utc>, JwksError> {
    models::offset_by_seconds(now, policy.key_validity_seconds).ok_or_else(|| {
        JwksError::KeyGeneration(format!(
            "Key validity of {}s is out of range",
            policy.key_validity_seconds
        ))
    })
}

async fn refresh_valid_key_gauge(store: &dyn KeyStore, now: DateTime<Utc>) {
    match store.list_valid(now).await {
        Ok(valid) => metrics::set_valid_signing_keys(valid.len() as u64),
        Err(e) => tracing::warn!("Failed to count valid signing keys: {}", e),
    }
}
