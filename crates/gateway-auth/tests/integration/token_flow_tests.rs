//! E2E tests for password login.
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use gateway_auth_test_utils::{
    set_cookie_header, set_cookie_value, TestAuthServer, TokenAssertions, TEST_AUDIENCE,
    TEST_ISSUER, TEST_KEY_ID, TEST_PASSWORD, TEST_USERNAME,
};
use reqwest::StatusCode;
use serde_json::json;

async fn login(
    server: &TestAuthServer,
    username: &str,
    password: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.url_for("/api/v1/auth/token"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?)
}

#[tokio::test]
async fn test_login_valid_credentials_returns_bearer_pair() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = login(&server, TEST_USERNAME, TEST_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["token_type"], "bearer");
    assert!(body["expires"].is_string(), "expires should be a timestamp");
    assert!(uuid::Uuid::parse_str(body["refresh_token"].as_str().unwrap_or_default()).is_ok());

    let access_token = body["access_token"].as_str().unwrap_or_default().to_string();
    access_token
        .assert_valid_jwt()
        .assert_signed_by(TEST_KEY_ID)
        .assert_for_user(TEST_USERNAME)
        .assert_issued_for(TEST_ISSUER, TEST_AUDIENCE)
        .assert_expires_in(15 * 60)
        .assert_verifies_with(server.public_key(), TEST_ISSUER, TEST_AUDIENCE);

    Ok(())
}

#[tokio::test]
async fn test_login_sets_protected_refresh_cookie() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = login(&server, TEST_USERNAME, TEST_PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie_header(&response, "refresh_token").expect("refresh cookie should be set");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/api/v1/auth"));
    assert!(cookie.contains("Max-Age=604800"), "7 day lifetime: {}", cookie);

    let sealed = set_cookie_value(&response, "refresh_token").unwrap_or_default();
    let body: serde_json::Value = response.json().await?;
    let refresh_token = body["refresh_token"].as_str().unwrap_or_default();

    assert!(!sealed.is_empty());
    assert!(
        !sealed.contains(refresh_token),
        "Cookie must not carry the refresh token in clear"
    );

    Ok(())
}

#[tokio::test]
async fn test_login_wrong_password_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = login(&server, TEST_USERNAME, "wrong password").await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_header(&response, "refresh_token").is_none());

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
    assert!(server.in_memory_store().is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_login_unknown_user_matches_wrong_password() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let unknown = login(&server, "mallory", TEST_PASSWORD).await?;
    let wrong = login(&server, TEST_USERNAME, "nope").await?;

    assert_eq!(unknown.status(), wrong.status());
    let unknown_body: serde_json::Value = unknown.json().await?;
    let wrong_body: serde_json::Value = wrong.json().await?;
    assert_eq!(unknown_body, wrong_body);

    Ok(())
}

#[tokio::test]
async fn test_login_twice_invalidates_first_refresh_token() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let first: serde_json::Value = login(&server, TEST_USERNAME, TEST_PASSWORD).await?.json().await?;
    let second: serde_json::Value = login(&server, TEST_USERNAME, TEST_PASSWORD).await?.json().await?;

    assert_ne!(first["refresh_token"], second["refresh_token"]);
    assert_eq!(
        server
            .in_memory_store()
            .count_for_principal(TEST_USERNAME, TEST_AUDIENCE)
            .await,
        1
    );

    let response = server
        .client()
        .post(server.url_for("/api/v1/auth/refresh"))
        .json(&json!({ "refresh_token": first["refresh_token"] }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_login_malformed_body_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = server
        .client()
        .post(server.url_for("/api/v1/auth/token"))
        .json(&json!({ "username": TEST_USERNAME }))
        .send()
        .await?;

    assert!(response.status().is_client_error());
    assert!(server.in_memory_store().is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_login_custom_ttls_are_honored() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::builder()?
        .with_env("ACCESS_TOKEN_TTL_MINUTES", "5")
        .with_env("REFRESH_TOKEN_TTL_DAYS", "1")
        .spawn()
        .await?;

    let response = login(&server, TEST_USERNAME, TEST_PASSWORD).await?;
    let cookie = set_cookie_header(&response, "refresh_token").unwrap_or_default();
    assert!(cookie.contains("Max-Age=86400"), "1 day lifetime: {}", cookie);

    let body: serde_json::Value = response.json().await?;
    body["access_token"]
        .as_str()
        .unwrap_or_default()
        .to_string()
        .assert_expires_in(5 * 60);

    Ok(())
}
