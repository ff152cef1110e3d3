//! Test server harness for E2E testing
//!
//! Provides TestJwksServer for spawning real JWKS server instances in tests.

use anyhow::{anyhow, Result};
use chrono::Utc;
use jwks_service::config::{KeyPolicy, TokenTemplate};
use jwks_service::handlers::AppState;
use jwks_service::models::{Jwks, TokenResponse};
use jwks_service::repositories::{KeyStore, MemoryKeyStore};
use jwks_service::routes;
use jwks_service::services::key_management_service;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Metrics handle shared by every server in the test binary.
///
/// Only one recorder can be installed per process; later servers get a
/// detached recorder if installation already happened elsewhere.
fn test_metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

    HANDLE
        .get_or_init(|| {
            routes::init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Test harness for spawning the JWKS server in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_jwks_e2e() -> Result<()> {
///     let store = Arc::new(MemoryKeyStore::new());
///     store.put(test_key_pair("k1", 0, Utc::now() + Duration::hours(1))).await?;
///
///     let server = TestJwksServer::spawn(store).await?;
///     let jwks = server.fetch_jwks().await?;
///     assert_eq!(jwks.keys.len(), 1);
///     Ok(())
/// }
/// ```
pub struct TestJwksServer {
    addr: SocketAddr,
    store: Arc<dyn KeyStore>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestJwksServer {
    /// Spawn a server over an existing store with the default token template.
    pub async fn spawn(store: Arc<dyn KeyStore>) -> Result<Self> {
        Self::spawn_with_template(store, TokenTemplate::default()).await
    }

    /// Spawn a server on a fresh memory store bootstrapped the way the
    /// binary does it: one valid key and one expired key.
    pub async fn spawn_bootstrapped() -> Result<Self> {
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        key_management_service::initialize_signing_keys(
            store.as_ref(),
            &KeyPolicy::default(),
            Utc::now(),
        )
        .await
        .map_err(|e| anyhow!("Failed to initialize signing keys: {}", e))?;

        Self::spawn(store).await
    }

    /// Spawn a server with a custom token template.
    ///
    /// The server binds to a random port on 127.0.0.1 and runs in the
    /// background until the harness is dropped with the runtime.
    pub async fn spawn_with_template(
        store: Arc<dyn KeyStore>,
        token_template: TokenTemplate,
    ) -> Result<Self> {
        let state = Arc::new(AppState {
            store: Arc::clone(&store),
            token_template,
        });

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The store behind the server, for seeding keys mid-test.
    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// HTTP client reused across requests to this server.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET /.well-known/jwks.json and parse the body.
    pub async fn fetch_jwks(&self) -> Result<Jwks> {
        let response = self
            .client
            .get(format!("{}/.well-known/jwks.json", self.url()))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// POST /auth, optionally with `?expired=true`, and return the token.
    pub async fn request_token(&self, expired: bool) -> Result<String> {
        let url = if expired {
            format!("{}/auth?expired=true", self.url())
        } else {
            format!("{}/auth", self.url())
        };

        let response = self.client.post(url).send().await?.error_for_status()?;
        let body: TokenResponse = response.json().await?;
        Ok(body.token)
    }
}
