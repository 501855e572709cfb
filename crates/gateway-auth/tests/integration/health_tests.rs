//! E2E tests for operational endpoints.

use gateway_auth_test_utils::{TestAuthServer, TEST_PASSWORD, TEST_USERNAME};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_health_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = server.client().get(server.url_for("/health")).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn test_ready_with_healthy_store() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = server.client().get(server.url_for("/ready")).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"], "healthy");
    assert!(body.get("error").is_none());

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_served() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    server
        .client()
        .post(server.url_for("/api/v1/auth/token"))
        .json(&json!({ "username": TEST_USERNAME, "password": TEST_PASSWORD }))
        .send()
        .await?;

    let response = server.client().get(server.url_for("/metrics")).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await?;
    assert!(
        body.contains("ga_token_issuance_total"),
        "login should be counted: {}",
        body
    );

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = server
        .client()
        .get(server.url_for("/api/v1/auth/unknown"))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
