use super::KeyStore;
use crate::errors::JwksError;
use crate::models::KeyPair;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// In-process key store.
///
/// Readers share the lock; `put` and `purge_expired_before` take it
/// exclusively, so a registration never interleaves with a listing.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<Vec<KeyPair>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyStore for MemoryKeyStore {
    async fn put(&self, key_pair: KeyPair) -> Result<(), JwksError> {
        let mut keys = self.keys.write().await;
        if keys.iter().any(|k| k.kid() == key_pair.kid()) {
            return Err(JwksError::DuplicateKeyId(key_pair.kid().to_string()));
        }
        keys.push(key_pair);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<KeyPair>, JwksError> {
        Ok(self.keys.read().await.clone())
    }

    async fn list_valid(&self, now: DateTime<Utc>) -> Result<Vec<KeyPair>, JwksError> {
        Ok(self
            .keys
            .read()
            .await
            .iter()
            .filter(|k| k.is_valid_at(now))
            .cloned()
            .collect())
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, JwksError> {
        let mut keys = self.keys.write().await;
        let mut purged = Vec::new();
        keys.retain(|k| {
            if k.not_after() <= cutoff {
                purged.push(k.kid().to_string());
                false
            } else {
                true
            }
        });
        Ok(purged)
    }
}
