//! Credential verifiers and user seeding for tests.

use async_trait::async_trait;
use gateway_auth::crypto;
use gateway_auth::errors::CredentialError;
use gateway_auth::services::credential_verifier::CredentialVerifier;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const TEST_USERNAME: &str = "alice";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// In-memory verifier over a fixed username/password table.
#[derive(Default)]
pub struct StaticCredentialVerifier {
    users: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticCredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier that knows [`TEST_USERNAME`] / [`TEST_PASSWORD`].
    pub fn with_test_user() -> Self {
        Self::new().with_user(TEST_USERNAME, TEST_PASSWORD)
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.users.insert(username.to_string(), password.to_string());
        self
    }

    /// Number of verifications performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentialVerifier {
    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<bool, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .get(username)
            .is_some_and(|expected| expected == password))
    }
}

/// Verifier whose backend is always down.
pub struct UnavailableCredentialVerifier;

#[async_trait]
impl CredentialVerifier for UnavailableCredentialVerifier {
    async fn verify_password(&self, _: &str, _: &str) -> Result<bool, CredentialError> {
        Err(CredentialError::Unavailable(
            "injected: credential store unreachable".to_string(),
        ))
    }
}

/// Insert a user row with a low-cost bcrypt hash of `password`.
pub async fn seed_user(pool: &PgPool, username: &str, password: &str) -> Result<(), anyhow::Error> {
    let hash = crypto::hash_password(password, 4)?;
    sqlx::query("INSERT INTO users (username, password_hash) VALUES ($1, $2)")
        .bind(username)
        .bind(hash)
        .execute(pool)
        .await?;
    Ok(())
}
