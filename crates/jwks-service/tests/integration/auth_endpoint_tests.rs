//! Token issuance over HTTP.

use anyhow::Result;
use chrono::{Duration, Utc};
use jwks_service::config::TokenTemplate;
use jwks_service::repositories::{KeyStore, MemoryKeyStore};
use jwks_test_utils::{test_key_pair, verify_with_jwk, TestJwksServer, TokenAssertions};
use reqwest::StatusCode;
use std::sync::Arc;

/// One valid key `live` and one expired key `stale`.
async fn server_with_live_and_stale() -> Result<TestJwksServer> {
    let store = Arc::new(MemoryKeyStore::new());
    let now = Utc::now();
    store.put(test_key_pair("live", 0, now + Duration::hours(24))).await?;
    store.put(test_key_pair("stale", 1, now - Duration::seconds(1))).await?;
    TestJwksServer::spawn(store).await
}

#[tokio::test]
async fn test_token_round_trips_through_published_jwks() -> Result<()> {
    let server = server_with_live_and_stale().await?;

    let token = server.request_token(false).await?;
    let jwks = server.fetch_jwks().await?;

    token
        .assert_valid_jwt()
        .assert_signed_by("live")
        .assert_expires_in(3600)
        .assert_issuer("exampleIssuer")
        .assert_for_subject("exampleSubject")
        .assert_verifies_against(&jwks);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_rejected_by_verifiers() -> Result<()> {
    let server = server_with_live_and_stale().await?;

    let token = server.request_token(true).await?;
    let jwks = server.fetch_jwks().await?;

    token
        .assert_valid_jwt()
        .assert_signed_by("stale")
        .assert_expired_claims()
        .assert_rejected_by(&jwks);

    // kid is not in the published set at all
    assert!(jwks.keys.iter().all(|k| k.kid != "stale"));
    Ok(())
}

#[tokio::test]
async fn test_expired_token_signature_is_genuine() -> Result<()> {
    let server = server_with_live_and_stale().await?;
    let token = server.request_token(true).await?;

    // Build the JWK for the expired key directly; only exp should fail.
    let stale = server
        .store()
        .list_all()
        .await?
        .into_iter()
        .find(|k| k.kid() == "stale")
        .expect("stale key present");
    let jwk = jwks_service::crypto::public_jwk(&stale);

    assert!(verify_with_jwk(&token, &jwk, false).is_ok());
    assert!(verify_with_jwk(&token, &jwk, true).is_err());
    Ok(())
}

#[tokio::test]
async fn test_expired_flag_spellings() -> Result<()> {
    let server = server_with_live_and_stale().await?;

    for (query, expected_kid) in [
        ("?expired=true", "stale"),
        ("?expired=TRUE", "stale"),
        ("?expired=1", "stale"),
        ("?expired", "stale"),
        ("?expired=false", "live"),
        ("?expired=0", "live"),
        ("", "live"),
    ] {
        let response = server
            .client()
            .post(format!("{}/auth{}", server.url(), query))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK, "query {query:?}");

        let body: serde_json::Value = response.json().await?;
        body["token"]
            .as_str()
            .expect("token field")
            .to_string()
            .assert_signed_by(expected_kid);
    }
    Ok(())
}

#[tokio::test]
async fn test_request_body_is_ignored() -> Result<()> {
    let server = server_with_live_and_stale().await?;

    let response = server
        .client()
        .post(format!("{}/auth", server.url()))
        .json(&serde_json::json!({"username": "userABC", "password": "password123"}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_auth_rejects_other_methods() -> Result<()> {
    let server = server_with_live_and_stale().await?;
    let url = format!("{}/auth", server.url());

    for method in [
        reqwest::Method::GET,
        reqwest::Method::PUT,
        reqwest::Method::PATCH,
        reqwest::Method::DELETE,
    ] {
        let response = server.client().request(method.clone(), &url).send().await?;
        assert_eq!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED,
            "{method} /auth"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_no_valid_key_returns_json_error() -> Result<()> {
    let store = Arc::new(MemoryKeyStore::new());
    store
        .put(test_key_pair("stale", 0, Utc::now() - Duration::hours(1)))
        .await?;
    let server = TestJwksServer::spawn(store).await?;

    let response = server
        .client()
        .post(format!("{}/auth", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NO_VALID_KEY");
    assert!(body["error"]["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_expired_request_without_expired_key_fails() -> Result<()> {
    let store = Arc::new(MemoryKeyStore::new());
    store
        .put(test_key_pair("live", 0, Utc::now() + Duration::hours(1)))
        .await?;
    let server = TestJwksServer::spawn(store).await?;

    let response = server
        .client()
        .post(format!("{}/auth?expired=true", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NO_EXPIRED_KEY");
    Ok(())
}

#[tokio::test]
async fn test_custom_token_template() -> Result<()> {
    let store = Arc::new(MemoryKeyStore::new());
    store
        .put(test_key_pair("live", 0, Utc::now() + Duration::hours(1)))
        .await?;
    let template = TokenTemplate {
        issuer: "https://issuer.test".to_string(),
        subject: "client-42".to_string(),
        ttl_seconds: 300,
    };
    let server = TestJwksServer::spawn_with_template(store, template).await?;

    server
        .request_token(false)
        .await?
        .assert_issuer("https://issuer.test")
        .assert_for_subject("client-42")
        .assert_expires_in(300);
    Ok(())
}

#[tokio::test]
async fn test_bootstrapped_server_serves_both_flavours() -> Result<()> {
    let server = TestJwksServer::spawn_bootstrapped().await?;
    let jwks = server.fetch_jwks().await?;
    assert_eq!(jwks.keys.len(), 1);

    server
        .request_token(false)
        .await?
        .assert_verifies_against(&jwks);
    server
        .request_token(true)
        .await?
        .assert_expired_claims()
        .assert_rejected_by(&jwks);
    Ok(())
}
