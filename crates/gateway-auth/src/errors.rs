use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Access token signing failure.
///
/// Always a configuration fault (bad key material or bad input); never retried.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Invalid signing input: {0}")]
    InvalidInput(String),

    #[error("JWT signing operation failed: {0}")]
    Encoding(String),
}

/// Access token verification failure.
///
/// Deliberately carries no detail; the reason is logged at debug level.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("The access token is invalid or expired")]
    InvalidToken,
}

/// Refresh cookie sealing failure.
#[derive(Debug, Error)]
#[error("Refresh cookie sealing failed: {0}")]
pub struct CookieSealError(pub String);

/// Refresh token store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable, transaction failed or operation timed out.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A store invariant does not hold (e.g. duplicate records for one token).
    #[error("Integrity violation: {0}")]
    Integrity(String),
}

/// Token pair issuance failure.
///
/// When this is returned, no access token was handed out.
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("Token signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Refresh token persistence failed: {0}")]
    Persistence(String),

    #[error("Refresh token integrity violation: {0}")]
    Integrity(String),
}

impl From<StoreError> for IssuanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Persistence(msg) => IssuanceError::Persistence(msg),
            StoreError::Integrity(msg) => IssuanceError::Integrity(msg),
        }
    }
}

/// Expected refresh rejection. Returned as a value, not raised as a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("Expired refresh token")]
    Expired,

    #[error("Invalid refresh token")]
    Invalid,
}

/// Failure reported by a [`CredentialVerifier`](crate::services::credential_verifier::CredentialVerifier) backend.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential verifier unavailable: {0}")]
    Unavailable(String),
}

/// Password login failure.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Verifier(#[from] CredentialError),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing refresh token")]
    MissingRefreshToken,

    #[error("Expired refresh token")]
    RefreshTokenExpired,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Expired and invalid refresh tokens reported identically.
    #[error("Refresh token rejected")]
    RefreshTokenRejected,

    #[error("Token issuance failed: {0}")]
    Issuance(#[from] IssuanceError),

    #[error("Internal server error")]
    Internal,
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidCredentials => ApiError::InvalidCredentials,
            LoginError::Verifier(e) => {
                tracing::error!(target: "gateway_auth::errors", error = %e, "Credential verifier failed");
                ApiError::Internal
            }
            LoginError::Issuance(e) => ApiError::Issuance(e),
        }
    }
}

impl ApiError {
    /// Map an expected refresh rejection, optionally hiding which case applied.
    pub fn from_refresh_failure(failure: RefreshFailure, conceal_reason: bool) -> Self {
        match (failure, conceal_reason) {
            (_, true) => ApiError::RefreshTokenRejected,
            (RefreshFailure::Expired, false) => ApiError::RefreshTokenExpired,
            (RefreshFailure::Invalid, false) => ApiError::InvalidRefreshToken,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials
            | ApiError::MissingRefreshToken
            | ApiError::RefreshTokenExpired
            | ApiError::RefreshTokenRejected => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRefreshToken => StatusCode::BAD_REQUEST,
            ApiError::Issuance(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            ApiError::InvalidCredentials => ("INVALID_CREDENTIALS", "Invalid username or password"),
            ApiError::MissingRefreshToken => (
                "MISSING_REFRESH_TOKEN",
                "No refresh token was presented. Please login again.",
            ),
            ApiError::RefreshTokenExpired => (
                "REFRESH_TOKEN_EXPIRED",
                "Expired refresh token. Please login again.",
            ),
            ApiError::InvalidRefreshToken | ApiError::RefreshTokenRejected => (
                "INVALID_REFRESH_TOKEN",
                "Invalid refresh token. Please login again.",
            ),
            // Never echo signing or database details to the client.
            ApiError::Issuance(_) => ("TOKEN_ISSUANCE_FAILED", "Unable to issue tokens"),
            ApiError::Internal => ("INTERNAL_ERROR", "An internal error occurred"),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}
