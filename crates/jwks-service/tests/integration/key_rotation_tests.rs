//! Key rotation against a running server.

use anyhow::Result;
use chrono::{Duration, Utc};
use jwks_service::config::KeyPolicy;
use jwks_service::repositories::{KeyStore, MemoryKeyStore};
use jwks_service::tasks::key_rotation::{run_rotation, start_key_rotation, KeyRotationConfig};
use jwks_test_utils::{test_key_pair, TestJwksServer, TokenAssertions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn policy() -> KeyPolicy {
    KeyPolicy {
        seed_expired_key: false,
        ..KeyPolicy::default()
    }
}

#[tokio::test]
async fn test_rotation_publishes_new_key_alongside_old() -> Result<()> {
    let store = Arc::new(MemoryKeyStore::new());
    store
        .put(test_key_pair("ending", 0, Utc::now() + Duration::minutes(10)))
        .await?;
    let server = TestJwksServer::spawn(store).await?;

    let token_before = server.request_token(false).await?;

    let report = run_rotation(
        server.store().as_ref(),
        &policy(),
        &KeyRotationConfig::default(),
        Utc::now(),
    )
    .await;
    let new_kid = report.rotated_kid.expect("key inside lead window should rotate");

    let jwks = server.fetch_jwks().await?;
    let kids: Vec<&str> = jwks.keys.iter().map(|k| k.kid.as_str()).collect();
    assert_eq!(kids, vec!["ending", new_kid.as_str()]);

    // Tokens signed before rotation still verify
    token_before.assert_verifies_against(&jwks);
    Ok(())
}

#[tokio::test]
async fn test_rotation_noop_when_key_is_fresh() -> Result<()> {
    let store = Arc::new(MemoryKeyStore::new());
    store
        .put(test_key_pair("fresh", 0, Utc::now() + Duration::hours(24)))
        .await?;
    let server = TestJwksServer::spawn(store).await?;

    let report = run_rotation(
        server.store().as_ref(),
        &policy(),
        &KeyRotationConfig::default(),
        Utc::now(),
    )
    .await;

    assert!(report.rotated_kid.is_none());
    assert_eq!(server.fetch_jwks().await?.keys.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_retention_purge_keeps_recently_expired_keys() -> Result<()> {
    let store = Arc::new(MemoryKeyStore::new());
    let now = Utc::now();
    store.put(test_key_pair("ancient", 0, now - Duration::days(7))).await?;
    store.put(test_key_pair("recent", 1, now - Duration::seconds(30))).await?;
    store.put(test_key_pair("fresh", 2, now + Duration::hours(24))).await?;
    let server = TestJwksServer::spawn(store).await?;

    let config = KeyRotationConfig {
        retention_seconds: Some(86_400),
        ..KeyRotationConfig::default()
    };
    let report = run_rotation(server.store().as_ref(), &policy(), &config, now).await;
    assert_eq!(report.purged_kids, vec!["ancient".to_string()]);

    // The recently expired key still signs expired tokens
    server
        .request_token(true)
        .await?
        .assert_signed_by("recent");
    Ok(())
}

#[tokio::test]
async fn test_rotation_task_fills_empty_store_and_stops() -> Result<()> {
    let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let cancel_token = CancellationToken::new();

    let handle = tokio::spawn(start_key_rotation(
        Arc::clone(&store),
        policy(),
        KeyRotationConfig::default(),
        cancel_token.clone(),
    ));

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(30);
    while store.list_valid(Utc::now()).await?.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "rotation never ran");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    cancel_token.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle).await??;
    Ok(())
}
