//! E2E tests for refresh token exchange.
//!
//! Covers body and cookie transport, single-use rotation, and the
//! expired/invalid distinction with and without concealment.

use chrono::{Duration, Utc};
use gateway_auth_test_utils::{
    set_cookie_value, TestAuthServer, TokenAssertions, TEST_AUDIENCE, TEST_PASSWORD,
    TEST_USERNAME,
};
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

/// Log in and return `(body, sealed refresh cookie)`.
async fn login(server: &TestAuthServer) -> Result<(serde_json::Value, String), anyhow::Error> {
    let response = server
        .client()
        .post(server.url_for("/api/v1/auth/token"))
        .json(&json!({ "username": TEST_USERNAME, "password": TEST_PASSWORD }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie_value(&response, "refresh_token").unwrap_or_default();
    Ok((response.json().await?, cookie))
}

async fn refresh_with_body(
    server: &TestAuthServer,
    refresh_token: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await?)
}

async fn refresh_with_cookie(
    server: &TestAuthServer,
    sealed: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .header(reqwest::header::COOKIE, format!("refresh_token={}", sealed))
        .send()
        .await?)
}

async fn error_code(response: reqwest::Response) -> Result<String, anyhow::Error> {
    let body: serde_json::Value = response.json().await?;
    Ok(body["error"]["code"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_refresh_with_body_token_issues_new_pair() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let (original, _) = login(&server).await?;
    let original_refresh = original["refresh_token"].as_str().unwrap_or_default();

    let response = refresh_with_body(&server, original_refresh).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie_value(&response, "refresh_token").is_some());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["token_type"], "bearer");
    assert_ne!(body["refresh_token"], original["refresh_token"]);
    body["access_token"]
        .as_str()
        .unwrap_or_default()
        .to_string()
        .assert_for_user(TEST_USERNAME);

    Ok(())
}

#[tokio::test]
async fn test_refresh_token_is_single_use() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let (original, _) = login(&server).await?;
    let original_refresh = original["refresh_token"].as_str().unwrap_or_default();

    let first = refresh_with_body(&server, original_refresh).await?;
    assert_eq!(first.status(), StatusCode::OK);

    let replay = refresh_with_body(&server, original_refresh).await?;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(replay).await?, "INVALID_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_with_cookie_issues_new_pair() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let (original, sealed) = login(&server).await?;

    let response = refresh_with_cookie(&server, &sealed).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let new_sealed = set_cookie_value(&response, "refresh_token").unwrap_or_default();
    assert_ne!(new_sealed, sealed);

    let body: serde_json::Value = response.json().await?;
    assert_ne!(body["refresh_token"], original["refresh_token"]);

    // The replacement cookie works for the next round.
    let next = refresh_with_cookie(&server, &new_sealed).await?;
    assert_eq!(next.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_refresh_body_takes_precedence_over_cookie() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let (_, sealed) = login(&server).await?;

    let response = server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .header(reqwest::header::COOKIE, format!("refresh_token={}", sealed))
        .json(&json!({ "refresh_token": "not-a-valid-guid" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_refresh_malformed_token_returns_invalid() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = refresh_with_body(&server, "not-a-valid-guid").await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await?, "INVALID_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_unknown_token_returns_invalid() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = refresh_with_body(&server, &Uuid::new_v4().to_string()).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await?, "INVALID_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_tampered_cookie_returns_invalid() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let (_, sealed) = login(&server).await?;

    let mut tampered = sealed.into_bytes();
    if let Some(last) = tampered.last_mut() {
        *last = if *last == b'A' { b'B' } else { b'A' };
    }
    let tampered = String::from_utf8(tampered)?;

    let response = refresh_with_cookie(&server, &tampered).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await?, "INVALID_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_without_token_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "MISSING_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_expired_token_returns_expired() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let (original, _) = login(&server).await?;
    let refresh_token = original["refresh_token"].as_str().unwrap_or_default();

    let expired = server
        .in_memory_store()
        .set_expiry(Uuid::parse_str(refresh_token)?, Utc::now() - Duration::minutes(1))
        .await;
    assert!(expired);

    let response = refresh_with_body(&server, refresh_token).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "REFRESH_TOKEN_EXPIRED");
    // Rejection does not rotate or delete.
    assert_eq!(
        server
            .in_memory_store()
            .count_for_principal(TEST_USERNAME, TEST_AUDIENCE)
            .await,
        1
    );

    Ok(())
}

#[tokio::test]
async fn test_refresh_concealed_reason_is_identical() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder()?
        .with_env("CONCEAL_REFRESH_FAILURE_REASON", "true")
        .spawn()
        .await?;
    let (original, _) = login(&server).await?;
    let refresh_token = original["refresh_token"].as_str().unwrap_or_default();
    server
        .in_memory_store()
        .set_expiry(Uuid::parse_str(refresh_token)?, Utc::now() - Duration::minutes(1))
        .await;

    let expired = refresh_with_body(&server, refresh_token).await?;
    let invalid = refresh_with_body(&server, "not-a-valid-guid").await?;

    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);

    let expired_body: serde_json::Value = expired.json().await?;
    let invalid_body: serde_json::Value = invalid.json().await?;
    assert_eq!(expired_body, invalid_body);
    assert_eq!(expired_body["error"]["code"], "INVALID_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_concurrent_refresh_of_same_token_leaves_one_record() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let (original, _) = login(&server).await?;
    let refresh_token = original["refresh_token"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let attempts = (0..4).map(|_| refresh_with_body(&server, &refresh_token));
    let responses = futures::future::join_all(attempts).await;

    let mut successes = 0;
    for response in responses {
        let status = response?.status();
        assert!(
            status == StatusCode::OK || status == StatusCode::BAD_REQUEST,
            "unexpected status {}",
            status
        );
        if status == StatusCode::OK {
            successes += 1;
        }
    }

    assert!(successes >= 1);
    assert_eq!(
        server
            .in_memory_store()
            .count_for_principal(TEST_USERNAME, TEST_AUDIENCE)
            .await,
        1
    );

    Ok(())
}
