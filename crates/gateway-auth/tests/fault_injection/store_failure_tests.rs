//! Fault injection tests for refresh token store and verifier outages
//!
//! Validates that:
//! - No token pair is handed out when the refresh token cannot be stored
//! - Store faults surface as 500s without leaking details
//! - Readiness reflects the store while liveness is unaffected
//! - The service recovers once the store heals

use gateway_auth::services::refresh_token_store::InMemoryRefreshTokenStore;
use gateway_auth_test_utils::{
    set_cookie_header, Fault, FaultyRefreshTokenStore, TestAuthServer,
    UnavailableCredentialVerifier, TEST_PASSWORD, TEST_USERNAME,
};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;

async fn spawn_with_faulty_store(
) -> Result<(TestAuthServer, Arc<FaultyRefreshTokenStore>, Arc<InMemoryRefreshTokenStore>), anyhow::Error>
{
    let inner = Arc::new(InMemoryRefreshTokenStore::new());
    let faulty = Arc::new(FaultyRefreshTokenStore::new(inner.clone()));
    let server = TestAuthServer::builder()?
        .with_store(faulty.clone())
        .spawn()
        .await?;
    Ok((server, faulty, inner))
}

async fn login(server: &TestAuthServer) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.url_for("/api/v1/auth/token"))
        .json(&json!({ "username": TEST_USERNAME, "password": TEST_PASSWORD }))
        .send()
        .await?)
}

#[tokio::test]
async fn test_login_fails_closed_when_rotation_fails() -> Result<(), anyhow::Error> {
    let (server, faulty, inner) = spawn_with_faulty_store().await?;
    faulty.fail_rotate(Some(Fault::Persistence));

    let response = login(&server).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie_header(&response, "refresh_token").is_none());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "TOKEN_ISSUANCE_FAILED");
    assert!(body.get("access_token").is_none());
    assert!(
        !body.to_string().contains("injected"),
        "store details must not reach the client"
    );

    assert_eq!(faulty.rotate_calls(), 1);
    assert!(inner.is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_failed_rotation_keeps_previous_refresh_token() -> Result<(), anyhow::Error> {
    let (server, faulty, _inner) = spawn_with_faulty_store().await?;
    let original: serde_json::Value = login(&server).await?.json().await?;

    faulty.fail_rotate(Some(Fault::Persistence));
    let refresh = server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .json(&json!({ "refresh_token": original["refresh_token"] }))
        .send()
        .await?;
    assert_eq!(refresh.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Rolled back: the old token is still the live one.
    faulty.heal();
    let retry = server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .json(&json!({ "refresh_token": original["refresh_token"] }))
        .send()
        .await?;
    assert_eq!(retry.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_refresh_integrity_violation_returns_500() -> Result<(), anyhow::Error> {
    let (server, faulty, _inner) = spawn_with_faulty_store().await?;
    let original: serde_json::Value = login(&server).await?.json().await?;

    faulty.fail_find(Some(Fault::Integrity));
    let response = server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .json(&json!({ "refresh_token": original["refresh_token"] }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "TOKEN_ISSUANCE_FAILED");

    Ok(())
}

#[tokio::test]
async fn test_readiness_tracks_store_health() -> Result<(), anyhow::Error> {
    let (server, faulty, _inner) = spawn_with_faulty_store().await?;

    faulty.fail_ping(Some(Fault::Persistence));

    let ready = server.client().get(server.url_for("/ready")).send().await?;
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = ready.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["store"], "unhealthy");
    assert!(!body["error"].as_str().unwrap_or_default().contains("injected"));

    let health = server.client().get(server.url_for("/health")).send().await?;
    assert_eq!(health.status(), StatusCode::OK, "liveness must not depend on the store");

    faulty.heal();
    let ready = server.client().get(server.url_for("/ready")).send().await?;
    assert_eq!(ready.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_login_recovers_after_store_heals() -> Result<(), anyhow::Error> {
    let (server, faulty, inner) = spawn_with_faulty_store().await?;

    faulty.fail_rotate(Some(Fault::Persistence));
    assert_eq!(login(&server).await?.status(), StatusCode::INTERNAL_SERVER_ERROR);

    faulty.heal();
    assert_eq!(login(&server).await?.status(), StatusCode::OK);
    assert_eq!(inner.len().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_verifier_outage_returns_internal_error() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder()?
        .with_verifier(Arc::new(UnavailableCredentialVerifier))
        .spawn()
        .await?;

    let response = login(&server).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(server.in_memory_store().is_empty().await);

    Ok(())
}
