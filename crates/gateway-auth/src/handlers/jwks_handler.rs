use crate::crypto::Signer;
use crate::models::{JsonWebKey, Jwks};
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::sync::Arc;
use tracing::instrument;

use super::auth_handler::AppState;

/// Handle JWKS request
///
/// GET /.well-known/jwks.json
///
/// Publishes the public half of the signing key (RFC 7517, RFC 8037) so
/// resource servers can verify access tokens without calling back.
#[instrument(name = "ga.jwks.get", skip_all)]
pub async fn handle_get_jwks(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<Jwks>) {
    let jwks = jwks_for(state.token_service.signer());

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));

    (headers, Json(jwks))
}

fn jwks_for(signer: &Signer) -> Jwks {
    Jwks {
        keys: vec![JsonWebKey {
            kid: signer.key_id().to_string(),
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: URL_SAFE_NO_PAD.encode(signer.public_key()),
            use_: "sig".to_string(),
            alg: "EdDSA".to_string(),
        }],
    }
}
