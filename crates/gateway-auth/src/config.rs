use base64::{engine::general_purpose, Engine as _};
use ring::signature::Ed25519KeyPair;
use secrecy::SecretBox;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8083";
pub const DEFAULT_SIGNING_KEY_ID: &str = "gateway-auth-01";
pub const DEFAULT_REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Default access token lifetime (minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: u32 = 15;
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: u32 = 24 * 60;

/// Default refresh token lifetime (days).
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: u32 = 7;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: u32 = 365;

/// Upper bound for a single refresh-token store operation.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// AES-256-GCM key length for the refresh cookie key.
const COOKIE_KEY_LEN: usize = 32;

/// Service configuration.
///
/// Loaded once at startup and shared behind an `Arc`. A reload builds a new
/// snapshot instead of mutating this one, so the type is never mutated after
/// construction. Key material is wrapped in `SecretBox` so `Debug` output
/// stays redacted.
#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Ed25519 private key, PKCS#8 DER.
    pub signing_key: SecretBox<Vec<u8>>,
    pub signing_key_id: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_minutes: u32,
    pub refresh_token_ttl_days: u32,
    pub refresh_cookie_name: String,
    /// AES-256-GCM key used to seal the refresh cookie value.
    pub refresh_cookie_key: SecretBox<Vec<u8>>,
    pub store_timeout: Duration,
    /// Report expired and invalid refresh tokens with the same response.
    pub conceal_refresh_failure_reason: bool,
}

/// The token-lifecycle subset of [`Config`] handed to the token service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_minutes: u32,
    pub refresh_token_ttl_days: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("Invalid refresh cookie key: {0}")]
    InvalidCookieKey(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let signing_key = general_purpose::STANDARD
            .decode(required(vars, "TOKEN_SIGNING_KEY")?)
            .map_err(ConfigError::Base64Error)?;

        // Fail at startup rather than on the first login.
        Ed25519KeyPair::from_pkcs8(&signing_key).map_err(|e| {
            ConfigError::InvalidSigningKey(format!("Expected Ed25519 PKCS#8 key: {}", e))
        })?;

        let signing_key_id = vars
            .get("TOKEN_SIGNING_KEY_ID")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SIGNING_KEY_ID.to_string());

        let issuer = required_non_empty(vars, "TOKEN_ISSUER")?;
        let audience = required_non_empty(vars, "TOKEN_AUDIENCE")?;

        let access_token_ttl_minutes = parse_bounded(
            vars,
            "ACCESS_TOKEN_TTL_MINUTES",
            DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            MAX_ACCESS_TOKEN_TTL_MINUTES,
        )?;

        let refresh_token_ttl_days = parse_bounded(
            vars,
            "REFRESH_TOKEN_TTL_DAYS",
            DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            MAX_REFRESH_TOKEN_TTL_DAYS,
        )?;

        let refresh_cookie_name = vars
            .get("REFRESH_COOKIE_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REFRESH_COOKIE_NAME.to_string());

        let refresh_cookie_key = general_purpose::STANDARD
            .decode(required(vars, "REFRESH_COOKIE_KEY")?)
            .map_err(ConfigError::Base64Error)?;

        if refresh_cookie_key.len() != COOKIE_KEY_LEN {
            return Err(ConfigError::InvalidCookieKey(format!(
                "Expected {} bytes, got {}",
                COOKIE_KEY_LEN,
                refresh_cookie_key.len()
            )));
        }

        let store_timeout_ms = match vars.get("STORE_TIMEOUT_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: "STORE_TIMEOUT_MS".to_string(),
                    reason: format!("expected a positive integer, got {:?}", raw),
                })?,
            None => DEFAULT_STORE_TIMEOUT_MS,
        };

        let conceal_refresh_failure_reason = match vars.get("CONCEAL_REFRESH_FAILURE_REASON") {
            Some(raw) => raw.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                name: "CONCEAL_REFRESH_FAILURE_REASON".to_string(),
                reason: format!("expected true or false, got {:?}", raw),
            })?,
            None => false,
        };

        Ok(Config {
            database_url,
            bind_address,
            signing_key: SecretBox::new(Box::new(signing_key)),
            signing_key_id,
            issuer,
            audience,
            access_token_ttl_minutes,
            refresh_token_ttl_days,
            refresh_cookie_name,
            refresh_cookie_key: SecretBox::new(Box::new(refresh_cookie_key)),
            store_timeout: Duration::from_millis(store_timeout_ms),
            conceal_refresh_failure_reason,
        })
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            access_token_ttl_minutes: self.access_token_ttl_minutes,
            refresh_token_ttl_days: self.refresh_token_ttl_days,
        }
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn required_non_empty(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    let value = required(vars, name)?;
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(value)
}

fn parse_bounded(
    vars: &HashMap<String, String>,
    name: &str,
    default: u32,
    max: u32,
) -> Result<u32, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default);
    };

    let value = raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("{:?} is not a number: {}", raw, e),
    })?;

    if !(1..=max).contains(&value) {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("must be between 1 and {}, got {}", max, value),
        });
    }

    Ok(value)
}
