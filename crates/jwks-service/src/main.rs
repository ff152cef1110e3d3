//! JWKS key service
//!
//! Serves the public key set and signs test bearer tokens.

use chrono::Utc;
use jwks_service::config::Config;
use jwks_service::handlers::AppState;
use jwks_service::repositories::open_key_store;
use jwks_service::routes;
use jwks_service::services::key_management_service;
use jwks_service::tasks::start_key_rotation;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jwks_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JWKS service");

    // Load configuration
    let Config {
        bind_address,
        store_backend,
        database_url,
        master_key,
        key_policy,
        token_template,
        rotation,
    } = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %bind_address,
        store_backend = ?store_backend,
        key_bits = key_policy.key_bits,
        "Configuration loaded successfully"
    );

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let store = open_key_store(store_backend, &database_url, master_key)
        .await
        .map_err(|e| {
            error!("Failed to open key store: {}", e);
            e
        })?;

    // A service without a signing key is useless; fail startup.
    info!("Initializing signing keys...");
    key_management_service::initialize_signing_keys(store.as_ref(), &key_policy, Utc::now())
        .await
        .map_err(|e| {
            error!("Failed to initialize signing keys: {}", e);
            e
        })?;
    info!("Signing keys initialized");

    let cancel_token = CancellationToken::new();
    let rotation_handle = tokio::spawn(start_key_rotation(
        Arc::clone(&store),
        key_policy,
        rotation,
        cancel_token.clone(),
    ));

    let state = Arc::new(AppState {
        store,
        token_template,
    });
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("JWKS service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    if tokio::time::timeout(Duration::from_secs(5), rotation_handle)
        .await
        .is_err()
    {
        warn!("Key rotation task did not stop within 5 seconds");
    }

    info!("JWKS service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
