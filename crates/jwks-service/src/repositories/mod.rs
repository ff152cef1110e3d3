//! Key storage layer.
//!
//! [`KeyStore`] is the only shared mutable state in the service. Expiry is a
//! query-time predicate: expired keys stay in the store (and stay signable)
//! until an explicit retention purge removes them.

pub mod memory_keys;
pub mod signing_keys;

pub use memory_keys::MemoryKeyStore;
pub use signing_keys::SqliteKeyStore;

use crate::config::StoreBackend;
use crate::errors::JwksError;
use crate::models::KeyPair;
use chrono::{DateTime, Utc};
use secrecy::SecretBox;
use std::sync::Arc;

/// Registry of signing key pairs keyed by `kid`.
///
/// All listings are in insertion order, oldest first.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    /// Register a new pair. Fails with `DuplicateKeyId` if the `kid` is taken.
    async fn put(&self, key_pair: KeyPair) -> Result<(), JwksError>;

    /// Every registered pair regardless of expiry.
    async fn list_all(&self) -> Result<Vec<KeyPair>, JwksError>;

    /// Pairs whose `not_after` is strictly after `now`.
    async fn list_valid(&self, now: DateTime<Utc>) -> Result<Vec<KeyPair>, JwksError>;

    /// Physically remove pairs with `not_after <= cutoff`, returning their kids.
    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, JwksError>;
}

/// Open the configured backend.
///
/// The master key only applies to SQLite; the memory store never serializes
/// key material.
pub async fn open_key_store(
    backend: StoreBackend,
    database_url: &str,
    master_key: Option<SecretBox<Vec<u8>>>,
) -> Result<Arc<dyn KeyStore>, JwksError> {
    match backend {
        StoreBackend::Memory => {
            if master_key.is_some() {
                tracing::warn!("JWKS_MASTER_KEY is ignored by the memory key store");
            }
            Ok(Arc::new(MemoryKeyStore::new()))
        }
        StoreBackend::Sqlite => {
            if master_key.is_none() {
                tracing::warn!("Private keys will be stored unencrypted (JWKS_MASTER_KEY unset)");
            }
            let store = SqliteKeyStore::connect(database_url, master_key).await?;
            Ok(Arc::new(store))
        }
    }
}
