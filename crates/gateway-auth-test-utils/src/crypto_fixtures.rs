//! Deterministic cryptographic fixtures for testing
//!
//! The same seed always yields the same Ed25519 key, so token expectations
//! are reproducible across runs.

use base64::engine::general_purpose;
use base64::Engine;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::collections::HashMap;
use thiserror::Error;

pub const TEST_ISSUER: &str = "https://auth.gateway.test";
pub const TEST_AUDIENCE: &str = "gateway-api";
pub const TEST_KEY_ID: &str = "gateway-auth-test-01";

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Deterministic Ed25519 signing key.
///
/// Returns `(raw_public_key, private_key_pkcs8)`; the private key is a
/// PKCS#8 v2 document accepted by `Ed25519KeyPair::from_pkcs8`.
pub fn test_signing_key(seed: u8) -> Result<(Vec<u8>, Vec<u8>), FixtureError> {
    let mut seed_bytes = [0u8; 32];
    for (i, byte) in seed_bytes.iter_mut().enumerate() {
        *byte = seed.wrapping_mul(i as u8 + 1).wrapping_add(i as u8);
    }

    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
        .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e)))?;
    let public_key = key_pair.public_key().as_ref().to_vec();

    let pkcs8 = build_pkcs8_v2(&seed_bytes, &public_key);

    // Round-trip through the strict parser so a bad fixture fails here.
    Ed25519KeyPair::from_pkcs8(&pkcs8)
        .map_err(|e| FixtureError::Crypto(format!("Fixture PKCS#8 rejected: {}", e)))?;

    Ok((public_key, pkcs8))
}

/// PKCS#8 v2 (RFC 5958) for Ed25519: version 1, algorithm id, private key
/// seed, then the public key as `[1]` context field.
fn build_pkcs8_v2(seed: &[u8; 32], public_key: &[u8]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(85);

    // SEQUENCE, 83 bytes
    pkcs8.extend_from_slice(&[0x30, 0x53]);
    // version INTEGER 1
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x01]);
    // AlgorithmIdentifier { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    // privateKey OCTET STRING { OCTET STRING seed }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);
    // [1] publicKey BIT STRING
    pkcs8.extend_from_slice(&[0xa1, 0x23, 0x03, 0x21, 0x00]);
    pkcs8.extend_from_slice(public_key);

    pkcs8
}

/// Deterministic 32-byte AES-256-GCM key for sealing refresh cookies.
pub fn test_cookie_key() -> Vec<u8> {
    (0u8..32).collect()
}

/// Environment for `Config::from_vars` with deterministic keys.
///
/// Callers override entries to exercise specific settings.
pub fn test_config_vars(seed: u8) -> Result<HashMap<String, String>, FixtureError> {
    let (_, pkcs8) = test_signing_key(seed)?;

    Ok(HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://localhost/gateway_auth_test".to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        (
            "TOKEN_SIGNING_KEY".to_string(),
            general_purpose::STANDARD.encode(pkcs8),
        ),
        ("TOKEN_SIGNING_KEY_ID".to_string(), TEST_KEY_ID.to_string()),
        ("TOKEN_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("TOKEN_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        (
            "REFRESH_COOKIE_KEY".to_string(),
            general_purpose::STANDARD.encode(test_cookie_key()),
        ),
    ]))
}
