use crate::errors::{CookieSealError, SigningError, VerificationError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    rand::{SecureRandom, SystemRandom},
    signature::{Ed25519KeyPair, KeyPair},
};
use secrecy::{ExposeSecret, SecretBox};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use std::fmt;
use tracing::instrument;

/// Maximum accepted access token size in bytes (4KB).
///
/// Checked before any base64 decoding or signature work so oversized
/// input is rejected cheaply.
pub const MAX_JWT_SIZE_BYTES: usize = 4096;

/// Claim keys embedded in every access token.
pub const CLAIM_USERNAME: &str = "un";
pub const CLAIM_ADMIN: &str = "admin";
pub const CLAIM_ISSUER: &str = "iss";
pub const CLAIM_AUDIENCE: &str = "aud";

/// Keys the signer writes itself; never taken from a [`ClaimSet`].
const RESERVED_CLAIMS: [&str; 3] = [CLAIM_AUDIENCE, "iat", "exp"];

/// AES-GCM authentication tag length.
const TAG_LEN: usize = 16;

/// Ordered list of string claims embedded in an access token.
///
/// Built fresh for every issuance and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimSet {
    pairs: Vec<(String, String)>,
}

impl ClaimSet {
    /// Default claims for a user: username, admin flag, issuer, audience.
    ///
    /// The admin flag is always `"false"`; roles are not modelled yet.
    pub fn for_user(username: &str, issuer: &str, audience: &str) -> Self {
        Self {
            pairs: vec![
                (CLAIM_USERNAME.to_string(), username.to_string()),
                (CLAIM_ADMIN.to_string(), "false".to_string()),
                (CLAIM_ISSUER.to_string(), issuer.to_string()),
                (CLAIM_AUDIENCE.to_string(), audience.to_string()),
            ],
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Redacts the username claim.
impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.pairs {
            if key == CLAIM_USERNAME {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// JWT payload: claim set in order, then `aud`, `iat` and `exp`.
struct SignedPayload<'a> {
    claims: &'a ClaimSet,
    audience: &'a str,
    iat: i64,
    exp: i64,
}

impl Serialize for SignedPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in self.claims.pairs() {
            if !RESERVED_CLAIMS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry(CLAIM_AUDIENCE, self.audience)?;
        map.serialize_entry("iat", &self.iat)?;
        map.serialize_entry("exp", &self.exp)?;
        map.end()
    }
}

/// Claims exposed to a consumer verifying an access token.
#[derive(Clone, Deserialize)]
pub struct AccessClaims {
    pub un: String,
    pub admin: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl fmt::Debug for AccessClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessClaims")
            .field("un", &"[REDACTED]")
            .field("admin", &self.admin)
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

/// A signed access token and the absolute expiry embedded in it.
#[derive(Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Sign an access token with an Ed25519 (EdDSA) private key.
///
/// `exp` is set to now + `ttl_minutes` as an absolute timestamp so that a
/// stateless verifier can reject expired tokens on its own.
#[instrument(skip_all)]
pub fn sign_access_token(
    claims: &ClaimSet,
    audience: &str,
    private_key_pkcs8: &[u8],
    key_id: &str,
    ttl_minutes: u32,
) -> Result<SignedToken, SigningError> {
    sign_access_token_at(
        claims,
        audience,
        private_key_pkcs8,
        key_id,
        ttl_minutes,
        Utc::now(),
    )
}

/// [`sign_access_token`] with an explicit issuance time.
#[instrument(skip_all)]
pub fn sign_access_token_at(
    claims: &ClaimSet,
    audience: &str,
    private_key_pkcs8: &[u8],
    key_id: &str,
    ttl_minutes: u32,
    issued_at: DateTime<Utc>,
) -> Result<SignedToken, SigningError> {
    if claims.is_empty() {
        return Err(SigningError::InvalidInput(
            "Claim set must not be empty".to_string(),
        ));
    }

    if ttl_minutes == 0 {
        return Err(SigningError::InvalidInput(
            "Token lifetime must be positive".to_string(),
        ));
    }

    // jsonwebtoken defers key parsing to signing time; validate up front so a
    // bad key is reported as a key error.
    Ed25519KeyPair::from_pkcs8(private_key_pkcs8)
        .map_err(|e| SigningError::InvalidKey(format!("Invalid private key format: {}", e)))?;

    let encoding_key = EncodingKey::from_ed_der(private_key_pkcs8);

    let mut header = Header::new(Algorithm::EdDSA);
    header.typ = Some("JWT".to_string());
    header.kid = Some(key_id.to_string());

    let expires_at = issued_at + Duration::minutes(i64::from(ttl_minutes));
    let payload = SignedPayload {
        claims,
        audience,
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(&header, &payload, &encoding_key)
        .map_err(|e| SigningError::Encoding(e.to_string()))?;

    Ok(SignedToken { token, expires_at })
}

/// Derive the raw 32-byte Ed25519 public key from a PKCS#8 private key.
pub fn public_key_from_pkcs8(private_key_pkcs8: &[u8]) -> Result<Vec<u8>, SigningError> {
    let key_pair = Ed25519KeyPair::from_pkcs8(private_key_pkcs8)
        .map_err(|e| SigningError::InvalidKey(format!("Invalid private key format: {}", e)))?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

/// Verify an access token with the raw Ed25519 public key.
///
/// Validates size, signature, `exp`, `iss` and `aud`. Every failure maps to
/// the same opaque error; the detail only goes to debug logs.
#[instrument(skip_all)]
pub fn verify_access_token(
    token: &str,
    public_key: &[u8],
    issuer: &str,
    audience: &str,
) -> Result<AccessClaims, VerificationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "crypto",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(VerificationError::InvalidToken);
    }

    let decoding_key = DecodingKey::from_ed_der(public_key);

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.validate_exp = true;
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);

    let token_data = decode::<AccessClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "crypto", error = %e, "Token verification failed");
        VerificationError::InvalidToken
    })?;

    Ok(token_data.claims)
}

/// Holds the service's signing key and signs access tokens with it.
///
/// Immutable after construction, so one instance is shared by all request
/// tasks.
pub struct Signer {
    private_key: SecretBox<Vec<u8>>,
    public_key: Vec<u8>,
    key_id: String,
}

impl Signer {
    /// Validate the key material and build a signer.
    pub fn new(private_key_pkcs8: &[u8], key_id: &str) -> Result<Self, SigningError> {
        let public_key = public_key_from_pkcs8(private_key_pkcs8)?;
        Ok(Self {
            private_key: SecretBox::new(Box::new(private_key_pkcs8.to_vec())),
            public_key,
            key_id: key_id.to_string(),
        })
    }

    pub fn sign(
        &self,
        claims: &ClaimSet,
        audience: &str,
        ttl_minutes: u32,
    ) -> Result<SignedToken, SigningError> {
        sign_access_token(
            claims,
            audience,
            self.private_key.expose_secret(),
            &self.key_id,
            ttl_minutes,
        )
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Raw Ed25519 public key (32 bytes).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("private_key", &"[REDACTED]")
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, CookieSealError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| CookieSealError(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// Seal a refresh token for cookie transport with AES-256-GCM.
///
/// Output is `base64url(nonce || ciphertext || tag)` with a random 96-bit nonce.
#[instrument(skip_all)]
pub fn seal_refresh_token(refresh_token: &str, key: &[u8]) -> Result<String, CookieSealError> {
    let unbound_key = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|e| CookieSealError(format!("Cipher key creation failed: {}", e)))?;
    let sealing_key = LessSafeKey::new(unbound_key);

    let nonce_bytes: [u8; NONCE_LEN] = generate_random_bytes(NONCE_LEN)?
        .try_into()
        .map_err(|_| CookieSealError("Nonce generation produced wrong length".to_string()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = refresh_token.as_bytes().to_vec();
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|e| CookieSealError(format!("Encryption operation failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);

    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// Open a value produced by [`seal_refresh_token`].
///
/// Returns `None` for anything that does not decrypt under `key`; callers
/// treat that as an invalid refresh token.
#[instrument(skip_all)]
pub fn open_refresh_token(sealed: &str, key: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(sealed).ok()?;
    if bytes.len() < NONCE_LEN + TAG_LEN {
        tracing::debug!(target: "crypto", "Refresh cookie too short");
        return None;
    }

    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;

    let unbound_key = UnboundKey::new(&AES_256_GCM, key).ok()?;
    let opening_key = LessSafeKey::new(unbound_key);

    let mut in_out = ciphertext.to_vec();
    let plaintext = match opening_key.open_in_place(nonce, Aad::empty(), &mut in_out) {
        Ok(plaintext) => plaintext,
        Err(_) => {
            tracing::debug!(target: "crypto", "Refresh cookie failed authentication");
            return None;
        }
    };

    String::from_utf8(plaintext.to_vec()).ok()
}

/// Verify a password against a bcrypt hash
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

/// Hash a password with bcrypt
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}
