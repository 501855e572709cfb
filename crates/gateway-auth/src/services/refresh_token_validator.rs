//! Classifies a presented refresh token as valid, expired or invalid.

use crate::errors::StoreError;
use crate::observability::metrics::record_refresh_validation;
use crate::services::refresh_token_store::RefreshTokenStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;
use uuid::fmt::Hyphenated;
use uuid::Uuid;

/// Result of classifying a refresh token.
///
/// Exactly one case applies; `Valid` carries the owning username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTokenValidity {
    Valid(String),
    Expired,
    Invalid,
}

impl RefreshTokenValidity {
    fn outcome_label(&self) -> &'static str {
        match self {
            RefreshTokenValidity::Valid(_) => "valid",
            RefreshTokenValidity::Expired => "expired",
            RefreshTokenValidity::Invalid => "invalid",
        }
    }
}

/// Read-only validator over a refresh token store.
///
/// Only records issued for `audience` are accepted; the store is shared
/// across audiences.
#[derive(Clone)]
pub struct RefreshTokenValidator {
    store: Arc<dyn RefreshTokenStore>,
    audience: String,
}

impl RefreshTokenValidator {
    pub fn new(store: Arc<dyn RefreshTokenStore>, audience: impl Into<String>) -> Self {
        Self {
            store,
            audience: audience.into(),
        }
    }

    pub async fn validate(&self, token: &str) -> Result<RefreshTokenValidity, StoreError> {
        self.validate_at(token, Utc::now()).await
    }

    /// Classify `token` as of `now`.
    ///
    /// Malformed and unknown tokens are `Invalid`, not errors, as are
    /// records held for another audience. A record whose expiry equals
    /// `now` is already expired.
    #[instrument(skip_all)]
    pub async fn validate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenValidity, StoreError> {
        let result = self.classify(token, now).await;

        match &result {
            Ok(validity) => {
                tracing::debug!(target: "gateway_auth::refresh", outcome = validity.outcome_label(), "Refresh token classified");
                record_refresh_validation(validity.outcome_label());
            }
            Err(_) => record_refresh_validation("error"),
        }

        result
    }

    async fn classify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenValidity, StoreError> {
        // Hyphenated form only; surrounding whitespace is tolerated.
        let token = token.trim();
        let parsed = Uuid::parse_str(token)
            .ok()
            .filter(|_| token.len() == Hyphenated::LENGTH);
        let Some(token) = parsed else {
            return Ok(RefreshTokenValidity::Invalid);
        };

        let Some(record) = self.store.find_by_token(token).await? else {
            return Ok(RefreshTokenValidity::Invalid);
        };

        if record.audience != self.audience {
            tracing::debug!(target: "gateway_auth::refresh", "Refresh token belongs to another audience");
            return Ok(RefreshTokenValidity::Invalid);
        }

        if record.is_expired_at(now) {
            Ok(RefreshTokenValidity::Expired)
        } else {
            Ok(RefreshTokenValidity::Valid(record.username))
        }
    }
}
