use gateway_auth::config::Config;
use gateway_auth::crypto::Signer;
use gateway_auth::handlers::auth_handler::AppState;
use gateway_auth::observability::metrics::init_metrics_recorder;
use gateway_auth::routes;
use gateway_auth::services::credential_verifier::PgCredentialVerifier;
use gateway_auth::services::refresh_token_store::{PgRefreshTokenStore, RefreshTokenStore};
use gateway_auth::services::refresh_token_validator::RefreshTokenValidator;
use gateway_auth::services::token_service::TokenService;
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gateway Auth");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        issuer = %config.issuer,
        audience = %config.audience,
        access_token_ttl_minutes = config.access_token_ttl_minutes,
        refresh_token_ttl_days = config.refresh_token_ttl_days,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    let signer = Signer::new(config.signing_key.expose_secret(), &config.signing_key_id).map_err(|e| {
        error!("Failed to load signing key: {}", e);
        e
    })?;

    let store: Arc<dyn RefreshTokenStore> =
        Arc::new(PgRefreshTokenStore::new(db_pool.clone(), config.store_timeout));
    let validator = RefreshTokenValidator::new(store.clone(), config.audience.clone());
    let token_service = Arc::new(TokenService::new(
        signer,
        store,
        validator,
        config.token_settings(),
    ));
    let verifier = Arc::new(PgCredentialVerifier::new(db_pool));

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        token_service,
        verifier,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Gateway Auth listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway Auth stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
