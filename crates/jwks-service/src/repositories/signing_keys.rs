use super::KeyStore;
use crate::crypto;
use crate::errors::JwksError;
use crate::models::{KeyPair, KeyRecord};
use chrono::{DateTime, Utc};
use secrecy::SecretBox;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::instrument;

const CREATE_KEYS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS keys(
        kid TEXT PRIMARY KEY NOT NULL,
        key BLOB NOT NULL,
        exp INTEGER NOT NULL
    )
"#;

/// SQLite-backed key store.
///
/// One row per key pair: `kid`, the serialized private key (sealed with the
/// master key when one is configured) and `exp` in Unix seconds. The public
/// key is re-derived from the private key on every read. Rows are returned
/// in `rowid` order, which follows insertion order.
pub struct SqliteKeyStore {
    pool: SqlitePool,
    master_key: Option<SecretBox<Vec<u8>>>,
}

impl SqliteKeyStore {
    /// Open a pool for `database_url` and ensure the schema exists.
    pub async fn connect(
        database_url: &str,
        master_key: Option<SecretBox<Vec<u8>>>,
    ) -> Result<Self, JwksError> {
        // An in-memory database lives and dies with its single connection.
        let in_memory = database_url.contains(":memory:");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| JwksError::Database(format!("Failed to open database: {}", e)))?;

        Self::new(pool, master_key).await
    }

    /// Wrap an existing pool and ensure the schema exists.
    pub async fn new(
        pool: SqlitePool,
        master_key: Option<SecretBox<Vec<u8>>>,
    ) -> Result<Self, JwksError> {
        let store = Self { pool, master_key };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the `keys` table. Safe to run against an initialized database.
    pub async fn init_schema(&self) -> Result<(), JwksError> {
        sqlx::query(CREATE_KEYS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| JwksError::Database(format!("Failed to create keys table: {}", e)))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode_record(&self, record: KeyRecord) -> Result<KeyPair, JwksError> {
        let private_key = crypto::from_stored_key(&record.key, self.master_key.as_ref())?;
        let not_after = DateTime::<Utc>::from_timestamp(record.exp, 0).ok_or_else(|| {
            JwksError::Database(format!(
                "Key {} has out-of-range expiry {}",
                record.kid, record.exp
            ))
        })?;
        Ok(KeyPair::new(record.kid, private_key, not_after))
    }

    fn decode_records(&self, records: Vec<KeyRecord>) -> Result<Vec<KeyPair>, JwksError> {
        records
            .into_iter()
            .map(|record| self.decode_record(record))
            .collect()
    }
}

#[async_trait::async_trait]
impl KeyStore for SqliteKeyStore {
    #[instrument(skip_all, fields(kid = %key_pair.kid()))]
    async fn put(&self, key_pair: KeyPair) -> Result<(), JwksError> {
        let stored = crypto::to_stored_key(key_pair.private_key(), self.master_key.as_ref())?;

        sqlx::query("INSERT INTO keys (kid, key, exp) VALUES (?, ?, ?)")
            .bind(key_pair.kid())
            .bind(stored)
            .bind(key_pair.not_after().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db_err) if db_err.is_unique_violation() => {
                    JwksError::DuplicateKeyId(key_pair.kid().to_string())
                }
                _ => JwksError::Database(format!("Failed to insert key: {}", e)),
            })?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<KeyPair>, JwksError> {
        let records = sqlx::query_as::<_, KeyRecord>(
            r#"
            SELECT kid, key, exp
            FROM keys
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JwksError::Database(format!("Failed to fetch keys: {}", e)))?;

        self.decode_records(records)
    }

    async fn list_valid(&self, now: DateTime<Utc>) -> Result<Vec<KeyPair>, JwksError> {
        // exp is whole seconds, so `exp > floor(now)` is exactly `exp > now`.
        let records = sqlx::query_as::<_, KeyRecord>(
            r#"
            SELECT kid, key, exp
            FROM keys
            WHERE exp > ?
            ORDER BY rowid
            "#,
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JwksError::Database(format!("Failed to fetch valid keys: {}", e)))?;

        self.decode_records(records)
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, JwksError> {
        let purged: Vec<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM keys
            WHERE exp <= ?
            RETURNING kid
            "#,
        )
        .bind(cutoff.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JwksError::Database(format!("Failed to purge keys: {}", e)))?;

        Ok(purged.into_iter().map(|(kid,)| kid).collect())
    }
}
