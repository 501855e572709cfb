//! Read-only access to the `users` credential table.

use crate::errors::CredentialError;
use sqlx::PgPool;

/// Credential row (maps to users table)
#[derive(Clone, sqlx::FromRow)]
pub struct UserCredential {
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
}

/// Get the credential row for a username.
pub async fn get_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserCredential>, CredentialError> {
    let user = sqlx::query_as::<_, UserCredential>(
        r#"
        SELECT username, password_hash, is_active
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(|e| CredentialError::Unavailable(format!("Failed to fetch user: {}", e)))?;

    Ok(user)
}
