//! Password verification backends.

use crate::crypto;
use crate::errors::CredentialError;
use crate::repositories::users;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

/// Pre-computed bcrypt hash compared against when the user does not exist,
/// so both paths cost one bcrypt verification.
const DUMMY_PASSWORD_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Checks a username/password pair.
///
/// `Ok(false)` means the credentials are wrong; `Err` means the backend
/// could not answer.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_password(&self, username: &str, password: &str)
        -> Result<bool, CredentialError>;
}

/// Verifies against bcrypt hashes in the `users` table.
#[derive(Clone)]
pub struct PgCredentialVerifier {
    pool: PgPool,
}

impl PgCredentialVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialVerifier for PgCredentialVerifier {
    #[instrument(skip_all)]
    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<bool, CredentialError> {
        let user = users::get_by_username(&self.pool, username).await?;

        let (hash, is_active) = match user {
            Some(user) => (user.password_hash, user.is_active),
            None => (DUMMY_PASSWORD_HASH.to_string(), false),
        };

        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash))
            .await
            .map_err(|e| CredentialError::Unavailable(format!("Password check task failed: {}", e)))?;

        match matches {
            Ok(matches) => Ok(matches && is_active),
            Err(e) => {
                tracing::error!(target: "gateway_auth::credentials", error = %e, "Stored password hash is unusable");
                Ok(false)
            }
        }
    }
}
