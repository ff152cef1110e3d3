//! Operational endpoints.

use anyhow::Result;
use chrono::{Duration, Utc};
use jwks_service::repositories::{KeyStore, MemoryKeyStore};
use jwks_test_utils::{test_key_pair, TestJwksServer};
use reqwest::StatusCode;
use std::sync::Arc;

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let server = TestJwksServer::spawn(Arc::new(MemoryKeyStore::new())).await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_ready_once_bootstrapped() -> Result<()> {
    let server = TestJwksServer::spawn_bootstrapped().await?;

    let response = server
        .client()
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["signing_key"], "available");
    assert!(body.get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn test_not_ready_when_every_key_expired() -> Result<()> {
    let store = Arc::new(MemoryKeyStore::new());
    store
        .put(test_key_pair("stale", 0, Utc::now() - Duration::minutes(1)))
        .await?;
    let server = TestJwksServer::spawn(store).await?;

    let response = server
        .client()
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint() -> Result<()> {
    let server = TestJwksServer::spawn_bootstrapped().await?;

    // Generate some traffic first
    server.fetch_jwks().await?;
    server.request_token(false).await?;

    let response = server
        .client()
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_unknown_path_is_not_found() -> Result<()> {
    let server = TestJwksServer::spawn(Arc::new(MemoryKeyStore::new())).await?;

    let response = server
        .client()
        .get(format!("{}/.well-known/openid-configuration", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
