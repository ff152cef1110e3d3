//! JWKS publication over HTTP.

use anyhow::Result;
use chrono::{Duration, Utc};
use jwks_service::repositories::{KeyStore, MemoryKeyStore};
use jwks_test_utils::{test_key_pair, TestJwksServer};
use reqwest::StatusCode;
use std::sync::Arc;

async fn server_with(keys: &[(&str, Duration)]) -> Result<TestJwksServer> {
    let store = Arc::new(MemoryKeyStore::new());
    let now = Utc::now();
    for (slot, (kid, offset)) in keys.iter().enumerate() {
        store.put(test_key_pair(kid, slot, now + *offset)).await?;
    }
    TestJwksServer::spawn(store).await
}

#[tokio::test]
async fn test_jwks_lists_only_unexpired_keys_in_order() -> Result<()> {
    let server = server_with(&[
        ("first", Duration::hours(24)),
        ("expired", Duration::seconds(-1)),
        ("second", Duration::hours(48)),
    ])
    .await?;

    let jwks = server.fetch_jwks().await?;
    let kids: Vec<&str> = jwks.keys.iter().map(|k| k.kid.as_str()).collect();
    assert_eq!(kids, vec!["first", "second"]);

    for key in &jwks.keys {
        assert_eq!(key.alg, "RS256");
        assert_eq!(key.kty, "RSA");
        assert_eq!(key.use_, "sig");
        assert_eq!(key.e, "AQAB");
    }
    Ok(())
}

#[tokio::test]
async fn test_jwks_response_headers_and_shape() -> Result<()> {
    let server = server_with(&[("k1", Duration::hours(1))]).await?;

    let response = server
        .client()
        .get(format!("{}/.well-known/jwks.json", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["cache-control"].to_str()?,
        "max-age=300"
    );
    assert!(response.headers()["content-type"]
        .to_str()?
        .starts_with("application/json"));

    let body: serde_json::Value = response.json().await?;
    let key = body["keys"][0].as_object().expect("one key");
    let mut members: Vec<&str> = key.keys().map(String::as_str).collect();
    members.sort_unstable();
    assert_eq!(members, vec!["alg", "e", "kid", "kty", "n", "use"]);
    Ok(())
}

#[tokio::test]
async fn test_jwks_alias_path() -> Result<()> {
    let server = server_with(&[("k1", Duration::hours(1))]).await?;

    let body: serde_json::Value = server
        .client()
        .get(format!("{}/jwks", server.url()))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    assert_eq!(body["keys"][0]["kid"], "k1");
    Ok(())
}

#[tokio::test]
async fn test_jwks_empty_store() -> Result<()> {
    let server = server_with(&[]).await?;

    let response = server
        .client()
        .get(format!("{}/.well-known/jwks.json", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, r#"{"keys":[]}"#);
    Ok(())
}

#[tokio::test]
async fn test_jwks_reflects_keys_added_after_start() -> Result<()> {
    let server = server_with(&[("k1", Duration::hours(1))]).await?;
    assert_eq!(server.fetch_jwks().await?.keys.len(), 1);

    server
        .store()
        .put(test_key_pair("k2", 1, Utc::now() + Duration::hours(2)))
        .await?;

    let kids: Vec<String> = server
        .fetch_jwks()
        .await?
        .keys
        .into_iter()
        .map(|k| k.kid)
        .collect();
    assert_eq!(kids, vec!["k1", "k2"]);
    Ok(())
}
