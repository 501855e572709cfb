//! Refresh token store.
//!
//! Owns persistence of [`RefreshTokenRecord`]s. The store guarantees that at
//! most one record exists per (username, audience): `rotate_token` deletes
//! the old record and inserts the new one as one atomic unit, and only
//! returns the new token after that unit is durable.

use crate::errors::StoreError;
use crate::models::RefreshTokenRecord;
use crate::observability::metrics::{record_integrity_violation, record_store_operation};
use crate::repositories::refresh_tokens;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Atomically replace the refresh token of (username, audience).
    ///
    /// Returns the new token only once the replacement has committed.
    async fn rotate_token(
        &self,
        username: &str,
        audience: &str,
        ttl_days: u32,
    ) -> Result<Uuid, StoreError>;

    /// Read the record holding `token`, if any.
    ///
    /// More than one match is an [`StoreError::Integrity`] error.
    async fn find_by_token(&self, token: Uuid) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// `now + ttl_days`, or a persistence error when that is not representable.
fn expiry_after_days(ttl_days: u32) -> Result<DateTime<Utc>, StoreError> {
    Duration::try_days(i64::from(ttl_days))
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            StoreError::Persistence(format!("Refresh token lifetime of {} days is out of range", ttl_days))
        })
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// PostgreSQL-backed store.
///
/// Every operation is bounded by `timeout`; hitting it is reported as a
/// persistence error and not retried here.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
    timeout: std::time::Duration,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool, timeout: std::time::Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Persistence(format!(
                "Refresh token {} timed out after {}ms",
                operation,
                self.timeout.as_millis()
            ))),
        };

        let status = if result.is_ok() { "success" } else { "error" };
        record_store_operation(operation, status, start.elapsed());

        if let Err(StoreError::Integrity(msg)) = &result {
            tracing::error!(target: "gateway_auth::store", operation, error = %msg, "Refresh token store integrity violation");
            record_integrity_violation(operation);
        }

        result
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    #[instrument(skip_all, fields(audience = %audience))]
    async fn rotate_token(
        &self,
        username: &str,
        audience: &str,
        ttl_days: u32,
    ) -> Result<Uuid, StoreError> {
        let token = Uuid::new_v4();
        let expires_at = expiry_after_days(ttl_days)?;

        let record = self
            .bounded(
                "rotate",
                refresh_tokens::rotate_token(&self.pool, username, audience, token, expires_at),
            )
            .await?;

        Ok(record.token)
    }

    #[instrument(skip_all)]
    async fn find_by_token(&self, token: Uuid) -> Result<Option<RefreshTokenRecord>, StoreError> {
        self.bounded("find", refresh_tokens::find_by_token(&self.pool, token))
            .await
    }

    #[instrument(skip_all)]
    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", refresh_tokens::ping(&self.pool)).await
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store for tests and single-node development.
///
/// All records sit behind one async mutex; a rotation holds it for the
/// whole delete+insert, so rotations are serialized and readers never see
/// an intermediate state. Contents do not survive a restart.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    records: Mutex<HashMap<Uuid, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for (username, audience), expired included.
    pub async fn count_for_principal(&self, username: &str, audience: &str) -> usize {
        self.records
            .lock()
            .await
            .values()
            .filter(|r| r.username == username && r.audience == audience)
            .count()
    }

    /// Total number of records held.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Overwrite the expiry of an existing record. Returns false if absent.
    pub async fn set_expiry(&self, token: Uuid, expires_at: DateTime<Utc>) -> bool {
        match self.records.lock().await.get_mut(&token) {
            Some(record) => {
                record.expires_at = expires_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn rotate_token(
        &self,
        username: &str,
        audience: &str,
        ttl_days: u32,
    ) -> Result<Uuid, StoreError> {
        let record = RefreshTokenRecord {
            token: Uuid::new_v4(),
            username: username.to_string(),
            audience: audience.to_string(),
            expires_at: expiry_after_days(ttl_days)?,
        };
        let token = record.token;

        let mut records = self.records.lock().await;
        records.retain(|_, r| !(r.username == username && r.audience == audience));
        records.insert(token, record);

        Ok(token)
    }

    async fn find_by_token(&self, token: Uuid) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.records.lock().await.get(&token).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
