//! Refresh token repository.
//!
//! Raw SQL access to the `refresh_tokens` table. The token lifecycle rules
//! live in [`crate::services::refresh_token_store`]; this module only knows
//! how to run the statements atomically.

use crate::errors::StoreError;
use crate::models::RefreshTokenRecord;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Replace the refresh token of (username, audience) with `token`.
///
/// Runs as one transaction: take a transaction-scoped advisory lock on the
/// pair, delete every existing row for it, insert the new row, commit.
/// Concurrent rotations for the same pair queue on the lock, so the later
/// one deletes the earlier one's row and exactly one row survives. Any
/// error drops the transaction, which rolls it back.
pub async fn rotate_token(
    pool: &PgPool,
    username: &str,
    audience: &str,
    token: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<RefreshTokenRecord, StoreError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StoreError::Persistence(format!("Failed to start transaction: {}", e)))?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(principal_lock_key(username, audience))
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Persistence(format!("Failed to lock principal: {}", e)))?;

    sqlx::query(
        r#"
        DELETE FROM refresh_tokens
        WHERE username = $1 AND audience = $2
        "#,
    )
    .bind(username)
    .bind(audience)
    .execute(&mut *tx)
    .await
    .map_err(|e| StoreError::Persistence(format!("Failed to delete previous token: {}", e)))?;

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        INSERT INTO refresh_tokens (token, username, audience, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING token, username, audience, expires_at
        "#,
    )
    .bind(token)
    .bind(username)
    .bind(audience)
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| StoreError::Persistence(format!("Failed to insert refresh token: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| StoreError::Persistence(format!("Failed to commit rotation: {}", e)))?;

    Ok(record)
}

/// Look up the record holding `token`.
///
/// Fetches up to two rows so that a duplicate is reported instead of being
/// hidden behind `LIMIT 1`.
pub async fn find_by_token(
    pool: &PgPool,
    token: Uuid,
) -> Result<Option<RefreshTokenRecord>, StoreError> {
    let mut records = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT token, username, audience, expires_at
        FROM refresh_tokens
        WHERE token = $1
        LIMIT 2
        "#,
    )
    .bind(token)
    .fetch_all(pool)
    .await
    .map_err(|e| StoreError::Persistence(format!("Failed to fetch refresh token: {}", e)))?;

    if records.len() > 1 {
        return Err(StoreError::Integrity(format!(
            "{} refresh token records share one token value",
            records.len()
        )));
    }

    Ok(records.pop())
}

/// Count stored records for (username, audience), expired ones included.
pub async fn count_for_principal(
    pool: &PgPool,
    username: &str,
    audience: &str,
) -> Result<i64, StoreError> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM refresh_tokens
        WHERE username = $1 AND audience = $2
        "#,
    )
    .bind(username)
    .bind(audience)
    .fetch_one(pool)
    .await
    .map_err(|e| StoreError::Persistence(format!("Failed to count refresh tokens: {}", e)))?;

    Ok(count)
}

/// Cheap round trip used by the readiness probe.
pub async fn ping(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Persistence(format!("Database ping failed: {}", e)))?;

    Ok(())
}

/// Advisory lock key for a principal. Unit separator keeps
/// ("ab", "c") and ("a", "bc") apart.
fn principal_lock_key(username: &str, audience: &str) -> String {
    format!("{}\u{1f}{}", username, audience)
}
