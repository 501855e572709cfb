use crate::config::Config;
use crate::crypto::{open_refresh_token, seal_refresh_token};
use crate::errors::{ApiError, RefreshFailure};
use crate::models::TokenPair;
use crate::observability::metrics::record_error;
use crate::observability::ErrorCategory;
use crate::services::credential_verifier::CredentialVerifier;
use crate::services::token_service::{RefreshOutcome, TokenService};
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL, COOKIE, SET_COOKIE},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Path scope of the refresh cookie; only the auth endpoints receive it.
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct UserTokenRequest {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub token_service: Arc<TokenService>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

/// Handle password login
///
/// POST /api/v1/auth/token
///
/// Returns the token pair in the body and the sealed refresh token in an
/// HttpOnly cookie.
#[instrument(name = "ga.auth.token", skip_all, fields(status))]
pub async fn handle_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UserTokenRequest>,
) -> Result<(HeaderMap, Json<TokenPair>), ApiError> {
    let result = state
        .token_service
        .authenticate(
            state.verifier.as_ref(),
            &payload.username,
            payload.password.expose_secret(),
        )
        .await
        .map_err(ApiError::from);

    let pair = observe("token", result)?;
    let headers = token_response_headers(&state.config, &pair.refresh_token)?;

    Ok((headers, Json(pair)))
}

/// Handle refresh token exchange
///
/// POST /api/v1/auth/refresh
///
/// The token is read from the JSON body when present, otherwise from the
/// refresh cookie.
#[instrument(name = "ga.auth.refresh", skip_all, fields(status))]
pub async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Result<(HeaderMap, Json<TokenPair>), ApiError> {
    let body = payload.map(|Json(p)| p).unwrap_or_default();
    let result = refresh(&state, &headers, body).await;

    let pair = observe("refresh", result)?;
    let headers = token_response_headers(&state.config, &pair.refresh_token)?;

    Ok((headers, Json(pair)))
}

async fn refresh(
    state: &AppState,
    headers: &HeaderMap,
    body: RefreshRequest,
) -> Result<TokenPair, ApiError> {
    let conceal = state.config.conceal_refresh_failure_reason;
    let presented = presented_refresh_token(&state.config, headers, body)?;

    match state.token_service.refresh_for(&presented).await? {
        RefreshOutcome::Issued(pair) => Ok(pair),
        RefreshOutcome::Rejected(failure) => Err(ApiError::from_refresh_failure(failure, conceal)),
    }
}

/// Pick the presented refresh token: body first, then the sealed cookie.
fn presented_refresh_token(
    config: &Config,
    headers: &HeaderMap,
    body: RefreshRequest,
) -> Result<String, ApiError> {
    if let Some(token) = body.refresh_token.filter(|t| !t.trim().is_empty()) {
        return Ok(token);
    }

    let sealed = read_cookie(headers, &config.refresh_cookie_name).ok_or(ApiError::MissingRefreshToken)?;

    open_refresh_token(&sealed, config.refresh_cookie_key.expose_secret()).ok_or_else(|| {
        tracing::debug!(target: "gateway_auth::handlers", "Refresh cookie could not be opened");
        ApiError::from_refresh_failure(RefreshFailure::Invalid, config.conceal_refresh_failure_reason)
    })
}

/// Find a cookie by name across all `Cookie` headers.
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn refresh_cookie(name: &str, sealed: &str, ttl_days: u32) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path={}; Max-Age={}",
        name,
        sealed,
        REFRESH_COOKIE_PATH,
        u64::from(ttl_days) * SECONDS_PER_DAY
    )
}

fn token_response_headers(config: &Config, refresh_token: &str) -> Result<HeaderMap, ApiError> {
    let sealed = seal_refresh_token(refresh_token, config.refresh_cookie_key.expose_secret())
        .map_err(|e| {
            tracing::error!(target: "gateway_auth::handlers", error = %e, "Failed to seal refresh cookie");
            ApiError::Internal
        })?;

    let cookie = refresh_cookie(
        &config.refresh_cookie_name,
        &sealed,
        config.refresh_token_ttl_days,
    );
    let cookie = HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!(target: "gateway_auth::handlers", error = %e, "Refresh cookie is not a valid header value");
        ApiError::Internal
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(headers)
}

/// Record status on the current span and count errors by category.
fn observe<T>(operation: &'static str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    let span = tracing::Span::current();
    match &result {
        Ok(_) => {
            span.record("status", "success");
        }
        Err(err) => {
            span.record("status", "error");
            let category = ErrorCategory::from(err);
            record_error(operation, category.as_str(), err.status_code().as_u16());
        }
    }
    result
}
