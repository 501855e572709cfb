//! Token pair issuance and refresh.

use crate::config::TokenSettings;
use crate::crypto::{ClaimSet, Signer};
use crate::errors::{IssuanceError, LoginError, RefreshFailure};
use crate::models::TokenPair;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_token_issuance;
use crate::services::credential_verifier::CredentialVerifier;
use crate::services::refresh_token_store::RefreshTokenStore;
use crate::services::refresh_token_validator::{RefreshTokenValidator, RefreshTokenValidity};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Outcome of a refresh attempt that reached a decision.
///
/// Expected rejections are values here; only infrastructure faults are
/// returned as [`IssuanceError`].
#[derive(Debug)]
pub enum RefreshOutcome {
    Issued(TokenPair),
    Rejected(RefreshFailure),
}

/// Issues access/refresh token pairs.
///
/// Holds no per-request state; shared by all request tasks.
pub struct TokenService {
    signer: Signer,
    store: Arc<dyn RefreshTokenStore>,
    validator: RefreshTokenValidator,
    settings: TokenSettings,
}

impl TokenService {
    pub fn new(
        signer: Signer,
        store: Arc<dyn RefreshTokenStore>,
        validator: RefreshTokenValidator,
        settings: TokenSettings,
    ) -> Self {
        Self {
            signer,
            store,
            validator,
            settings,
        }
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn RefreshTokenStore> {
        &self.store
    }

    /// Issue a fresh pair for `username`, replacing any refresh token the
    /// user held for the configured audience.
    ///
    /// The access token is signed first but only returned once the new
    /// refresh token has been stored; on any failure nothing is handed out.
    #[instrument(skip_all, fields(user = %hash_for_correlation(username)))]
    pub async fn issue_for_user(&self, username: &str) -> Result<TokenPair, IssuanceError> {
        let settings = &self.settings;
        let claims = ClaimSet::for_user(username, &settings.issuer, &settings.audience);

        let access = self
            .signer
            .sign(&claims, &settings.audience, settings.access_token_ttl_minutes)
            .map_err(|e| {
                tracing::error!(target: "gateway_auth::token_service", error = %e, "Access token signing failed");
                IssuanceError::from(e)
            })?;

        let refresh_token = self
            .store
            .rotate_token(username, &settings.audience, settings.refresh_token_ttl_days)
            .await
            .map_err(|e| {
                tracing::error!(target: "gateway_auth::token_service", error = %e, "Refresh token rotation failed");
                IssuanceError::from(e)
            })?;

        tracing::info!(target: "gateway_auth::token_service", audience = %settings.audience, "Issued token pair");

        Ok(TokenPair::bearer(
            access.token,
            refresh_token.to_string(),
            access.expires_at,
        ))
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// A valid token is consumed: issuing the new pair rotates it out.
    #[instrument(skip_all)]
    pub async fn refresh_for(&self, presented: &str) -> Result<RefreshOutcome, IssuanceError> {
        let start = Instant::now();
        let result = self.refresh_inner(presented).await;

        let status = match &result {
            Ok(RefreshOutcome::Issued(_)) => "success",
            Ok(RefreshOutcome::Rejected(_)) => "rejected",
            Err(_) => "error",
        };
        record_token_issuance("refresh_token", status, start.elapsed());

        result
    }

    async fn refresh_inner(&self, presented: &str) -> Result<RefreshOutcome, IssuanceError> {
        match self.validator.validate(presented).await? {
            RefreshTokenValidity::Valid(username) => {
                let pair = self.issue_for_user(&username).await?;
                Ok(RefreshOutcome::Issued(pair))
            }
            RefreshTokenValidity::Expired => {
                tracing::debug!(target: "gateway_auth::token_service", "Refresh rejected: expired");
                Ok(RefreshOutcome::Rejected(RefreshFailure::Expired))
            }
            RefreshTokenValidity::Invalid => {
                tracing::debug!(target: "gateway_auth::token_service", "Refresh rejected: invalid");
                Ok(RefreshOutcome::Rejected(RefreshFailure::Invalid))
            }
        }
    }

    /// Verify credentials and issue a pair on success.
    #[instrument(skip_all, fields(user = %hash_for_correlation(username)))]
    pub async fn authenticate(
        &self,
        verifier: &dyn CredentialVerifier,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, LoginError> {
        let start = Instant::now();
        let result = self.authenticate_inner(verifier, username, password).await;

        let status = match &result {
            Ok(_) => "success",
            Err(LoginError::InvalidCredentials) => "rejected",
            Err(_) => "error",
        };
        record_token_issuance("password", status, start.elapsed());

        result
    }

    async fn authenticate_inner(
        &self,
        verifier: &dyn CredentialVerifier,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, LoginError> {
        if !verifier.verify_password(username, password).await? {
            tracing::warn!(target: "gateway_auth::token_service", "Login rejected: invalid credentials");
            return Err(LoginError::InvalidCredentials);
        }

        Ok(self.issue_for_user(username).await?)
    }
}
