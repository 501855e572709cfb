//! Custom test assertions for access tokens and refresh cookies.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
    #[serde(default)]
    pub kid: Option<String>,
}

/// Access token claims as issued by the service
#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub un: String,
    pub admin: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

fn split_jwt(token: &str) -> (String, String) {
    let parts: Vec<_> = token.split('.').collect();
    assert_eq!(
        parts.len(),
        3,
        "JWT must have 3 parts (header.payload.signature), got {}",
        parts.len()
    );
    (parts[0].to_string(), parts[1].to_string())
}

fn decode_header(token: &str) -> JwtHeader {
    let (header, _) = split_jwt(token);
    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .expect("Failed to base64 decode JWT header");
    serde_json::from_slice(&bytes).expect("Failed to parse JWT header JSON")
}

fn decode_claims(token: &str) -> JwtClaims {
    let (_, payload) = split_jwt(token);
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .expect("Failed to base64 decode JWT payload");
    serde_json::from_slice(&bytes).expect("Failed to parse JWT claims JSON")
}

/// Custom assertions for access tokens
///
/// # Example
/// ```rust,ignore
/// pair.access_token
///     .assert_valid_jwt()
///     .assert_for_user("alice")
///     .assert_expires_in(15 * 60);
/// ```
pub trait TokenAssertions {
    /// Assert the token is a structurally valid EdDSA JWT with our claims
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the `kid` header
    fn assert_signed_by(&self, key_id: &str) -> &Self;

    /// Assert the `un` claim, and that `admin` is `"false"`
    fn assert_for_user(&self, username: &str) -> &Self;

    /// Assert `iss` and `aud`
    fn assert_issued_for(&self, issuer: &str, audience: &str) -> &Self;

    /// Assert `exp` is `seconds` from now (5 second tolerance)
    fn assert_expires_in(&self, seconds: u64) -> &Self;

    /// Assert the signature verifies with the raw Ed25519 public key
    fn assert_verifies_with(&self, public_key: &[u8], issuer: &str, audience: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let header = decode_header(self);
        assert_eq!(header.alg, "EdDSA", "Expected EdDSA algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        let claims = decode_claims(self);
        assert!(claims.exp > claims.iat, "exp must be after iat");

        self
    }

    fn assert_signed_by(&self, key_id: &str) -> &Self {
        let header = decode_header(self);
        assert_eq!(
            header.kid.as_deref(),
            Some(key_id),
            "Expected key_id '{}', got {:?}",
            key_id,
            header.kid
        );
        self
    }

    fn assert_for_user(&self, username: &str) -> &Self {
        let claims = decode_claims(self);
        assert_eq!(
            claims.un, username,
            "Expected user '{}', got '{}'",
            username, claims.un
        );
        assert_eq!(claims.admin, "false", "admin claim must be \"false\"");
        self
    }

    fn assert_issued_for(&self, issuer: &str, audience: &str) -> &Self {
        let claims = decode_claims(self);
        assert_eq!(claims.iss, issuer, "Unexpected issuer");
        assert_eq!(claims.aud, audience, "Unexpected audience");
        self
    }

    fn assert_expires_in(&self, seconds: u64) -> &Self {
        let claims = decode_claims(self);
        let expires_in = claims.exp - chrono::Utc::now().timestamp();

        assert!(
            (expires_in - seconds as i64).abs() <= 5,
            "Expected token to expire in {} seconds, but expires in {} seconds",
            seconds,
            expires_in
        );
        self
    }

    fn assert_verifies_with(&self, public_key: &[u8], issuer: &str, audience: &str) -> &Self {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        let result = decode::<serde_json::Value>(self, &DecodingKey::from_ed_der(public_key), &validation);
        assert!(result.is_ok(), "Token failed verification: {:?}", result.err());
        self
    }
}

/// Extract the value of cookie `name` from a response's `Set-Cookie` headers.
pub fn set_cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    set_cookie_header(response, name).and_then(|cookie| {
        cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, value)| value.to_string())
    })
}

/// Full `Set-Cookie` header for cookie `name`, attributes included.
pub fn set_cookie_header(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .map(str::to_string)
}
