//! Test server harness for E2E testing
//!
//! Spawns the real router on a random local port. By default the server
//! uses the in-memory refresh token store and [`StaticCredentialVerifier`]
//! with the test user, so no database is needed.

use crate::credential_fixtures::StaticCredentialVerifier;
use crate::crypto_fixtures::test_config_vars;
use gateway_auth::config::Config;
use gateway_auth::crypto::Signer;
use gateway_auth::handlers::auth_handler::AppState;
use gateway_auth::observability::metrics::init_metrics_recorder;
use gateway_auth::routes;
use gateway_auth::services::credential_verifier::CredentialVerifier;
use gateway_auth::services::refresh_token_store::{InMemoryRefreshTokenStore, RefreshTokenStore};
use gateway_auth::services::refresh_token_validator::RefreshTokenValidator;
use gateway_auth::services::token_service::TokenService;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// One global recorder per test process; later servers share its handle.
fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Builder for [`TestAuthServer`].
pub struct TestAuthServerBuilder {
    vars: HashMap<String, String>,
    store: Option<Arc<dyn RefreshTokenStore>>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl TestAuthServerBuilder {
    /// Override a configuration variable (e.g. `CONCEAL_REFRESH_FAILURE_REASON`).
    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub async fn spawn(self) -> Result<TestAuthServer, anyhow::Error> {
        let config = Config::from_vars(&self.vars)?;

        let in_memory_store = Arc::new(InMemoryRefreshTokenStore::new());
        let store: Arc<dyn RefreshTokenStore> = match self.store {
            Some(store) => store,
            None => in_memory_store.clone(),
        };
        let verifier: Arc<dyn CredentialVerifier> = match self.verifier {
            Some(verifier) => verifier,
            None => Arc::new(StaticCredentialVerifier::with_test_user()),
        };

        let signer = Signer::new(config.signing_key.expose_secret(), &config.signing_key_id)?;
        let validator = RefreshTokenValidator::new(store.clone(), config.audience.clone());
        let token_service = Arc::new(TokenService::new(
            signer,
            store,
            validator,
            config.token_settings(),
        ));

        let state = Arc::new(AppState {
            config,
            token_service,
            verifier,
        });

        let app = routes::build_routes(state.clone(), metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(TestAuthServer {
            addr,
            state,
            in_memory_store,
            _handle: handle,
        })
    }
}

/// Running gateway auth server for E2E tests
///
/// # Example
/// ```rust,ignore
/// let server = TestAuthServer::spawn().await?;
/// let response = server
///     .client()
///     .post(server.url_for("/api/v1/auth/token"))
///     .json(&json!({"username": TEST_USERNAME, "password": TEST_PASSWORD}))
///     .send()
///     .await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    in_memory_store: Arc<InMemoryRefreshTokenStore>,
    _handle: JoinHandle<()>,
}

impl TestAuthServer {
    pub fn builder() -> Result<TestAuthServerBuilder, anyhow::Error> {
        Ok(TestAuthServerBuilder {
            vars: test_config_vars(1)?,
            store: None,
            verifier: None,
        })
    }

    /// Spawn with default settings: in-memory store, test user verifier.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::builder()?.spawn().await
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url(), path)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    pub fn token_service(&self) -> &TokenService {
        &self.state.token_service
    }

    /// Raw Ed25519 public key tokens are signed with.
    pub fn public_key(&self) -> &[u8] {
        self.state.token_service.signer().public_key()
    }

    /// The default in-memory store.
    ///
    /// Unused by the server when a custom store was supplied.
    pub fn in_memory_store(&self) -> &Arc<InMemoryRefreshTokenStore> {
        &self.in_memory_store
    }

    /// Fresh HTTP client without a cookie store.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::new()
    }
}
