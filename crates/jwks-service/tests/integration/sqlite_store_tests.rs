//! SQLite-backed service, end to end.

use anyhow::Result;
use chrono::Utc;
use jwks_service::config::KeyPolicy;
use jwks_service::repositories::{KeyStore, SqliteKeyStore};
use jwks_service::services::key_management_service;
use jwks_test_utils::{test_master_key, TestJwksServer, TokenAssertions};
use secrecy::SecretBox;
use std::path::PathBuf;
use std::sync::Arc;

/// Database file under the system temp dir, removed on drop.
struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("jwks-test-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.display())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn master_key() -> Option<SecretBox<Vec<u8>>> {
    Some(SecretBox::new(Box::new(test_master_key())))
}

#[tokio::test]
async fn test_sqlite_server_round_trip() -> Result<()> {
    let store = SqliteKeyStore::connect("sqlite::memory:", master_key()).await?;
    key_management_service::initialize_signing_keys(&store, &KeyPolicy::default(), Utc::now())
        .await?;
    let server = TestJwksServer::spawn(Arc::new(store)).await?;

    let jwks = server.fetch_jwks().await?;
    assert_eq!(jwks.keys.len(), 1);

    server
        .request_token(false)
        .await?
        .assert_valid_jwt()
        .assert_verifies_against(&jwks);
    server
        .request_token(true)
        .await?
        .assert_expired_claims()
        .assert_rejected_by(&jwks);
    Ok(())
}

#[tokio::test]
async fn test_keys_survive_reopen() -> Result<()> {
    let db = TempDb::new();
    let now = Utc::now();

    let first = SqliteKeyStore::connect(&db.url(), master_key()).await?;
    key_management_service::initialize_signing_keys(&first, &KeyPolicy::default(), now).await?;
    let original: Vec<_> = first.list_all().await?;
    first.pool().close().await;

    let reopened = SqliteKeyStore::connect(&db.url(), master_key()).await?;
    let reloaded = reopened.list_all().await?;

    assert_eq!(reloaded.len(), original.len());
    for (before, after) in original.iter().zip(&reloaded) {
        assert_eq!(before.kid(), after.kid());
        assert_eq!(before.public_key(), after.public_key());
        assert_eq!(before.not_after().timestamp(), after.not_after().timestamp());
    }

    // Bootstrap against an already-populated store adds nothing
    key_management_service::initialize_signing_keys(&reopened, &KeyPolicy::default(), now)
        .await?;
    assert_eq!(reopened.list_all().await?.len(), original.len());

    reopened.pool().close().await;
    Ok(())
}

#[tokio::test]
async fn test_reopen_with_wrong_master_key_fails() -> Result<()> {
    let db = TempDb::new();

    let first = SqliteKeyStore::connect(&db.url(), master_key()).await?;
    key_management_service::initialize_signing_keys(&first, &KeyPolicy::default(), Utc::now())
        .await?;
    first.pool().close().await;

    let wrong = SqliteKeyStore::connect(&db.url(), Some(SecretBox::new(Box::new(vec![0u8; 32]))))
        .await?;
    assert!(wrong.list_all().await.is_err());

    wrong.pool().close().await;
    Ok(())
}
