//! Observability module for the gateway auth service
//!
//! # Privacy by Default
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe field allow-listing.
//! Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (enums, outcomes, audience)
//! - **HASHED**: Must be SHA-256 hashed for correlation (username)
//! - **NEVER**: Must never appear in logs (passwords, access/refresh tokens, keys)

pub mod metrics;

use crate::errors::{ApiError, IssuanceError};
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for usernames, which need correlation across log entries but
/// should not be stored in plaintext. Not a security boundary.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    hex::encode(result.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad credentials
    Authentication,
    /// Expired, invalid or missing refresh token
    RefreshToken,
    /// Signing failures (configuration faults)
    Cryptographic,
    /// Store and other internal failures
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::RefreshToken => "refresh_token",
            ErrorCategory::Cryptographic => "cryptographic",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&ApiError> for ErrorCategory {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::InvalidCredentials => ErrorCategory::Authentication,
            ApiError::MissingRefreshToken
            | ApiError::RefreshTokenExpired
            | ApiError::InvalidRefreshToken
            | ApiError::RefreshTokenRejected => ErrorCategory::RefreshToken,
            ApiError::Issuance(IssuanceError::Signing(_)) => ErrorCategory::Cryptographic,
            ApiError::Issuance(_) | ApiError::Internal => ErrorCategory::Internal,
        }
    }
}
