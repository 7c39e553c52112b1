//! Test server harness for E2E testing
//!
//! Provides `TestNomnomServer` for spawning real service instances in tests.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use nomnom_service::auth::session::{SessionSigner, DEFAULT_SESSION_TTL};
use nomnom_service::config::Config;
use nomnom_service::routes::{self, AppState};
use nomnom_service::services::storage::mock::MockObjectStore;
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Session signing key used by every test server.
pub const TEST_SECRET_KEY: &str = "test-secret-key-that-is-at-least-32-bytes";

/// Shared handle; a recorder is built once and never installed globally.
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| PrometheusBuilder::new().build_recorder().handle())
        .clone()
}

/// Test harness for spawning the NomNom service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_health_flow_e2e(pool: PgPool) -> Result<()> {
///     let server = TestNomnomServer::spawn(pool).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestNomnomServer {
    addr: SocketAddr,
    pool: PgPool,
    config: Config,
    storage: Arc<MockObjectStore>,
    _handle: JoinHandle<()>,
}

impl TestNomnomServer {
    /// Spawn a server backed by an empty mock object store.
    pub async fn spawn(pool: PgPool) -> Result<Self, anyhow::Error> {
        Self::spawn_with_storage(pool, Arc::new(MockObjectStore::new())).await
    }

    /// Spawn a server backed by `storage`.
    ///
    /// The server binds to 127.0.0.1:0 and runs in the background until
    /// dropped.
    pub async fn spawn_with_storage(
        pool: PgPool,
        storage: Arc<MockObjectStore>,
    ) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("SECRET_KEY".to_string(), TEST_SECRET_KEY.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("NOMNOM_ALLOW_USERNAME_LOGIN".to_string(), "true".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState {
            pool: pool.clone(),
            config: config.clone(),
            storage: storage.clone(),
        });

        let app = routes::build_routes(state, metrics_handle());

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

        Ok(Self {
            addr,
            pool,
            config,
            storage,
            _handle: handle,
        })
    }

    /// Get reference to the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock object store behind the server.
    pub fn storage(&self) -> &MockObjectStore {
        &self.storage
    }

    /// A valid session token for `member_id`.
    pub fn session_token(&self, member_id: i64) -> String {
        SessionSigner::new(&self.config.secret_key, DEFAULT_SESSION_TTL)
            .issue(member_id)
            .expect("session signing should succeed")
    }

    /// `Cookie` header value carrying a session for `member_id`.
    pub fn session_cookie(&self, member_id: i64) -> String {
        format!("nomnom_session={}", self.session_token(member_id))
    }

    /// Client that does not follow redirects, for asserting on 302s.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("client should build")
    }
}

impl Drop for TestNomnomServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_server_spawns_successfully(pool: PgPool) -> Result<(), anyhow::Error> {
        let server = TestNomnomServer::spawn(pool).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_server_provides_pool_access(pool: PgPool) -> Result<(), anyhow::Error> {
        let server = TestNomnomServer::spawn(pool).await?;

        let result: (i32,) = sqlx::query_as("SELECT 1").fetch_one(server.pool()).await?;

        assert_eq!(result.0, 1);

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_multiple_servers_different_ports(pool: PgPool) -> Result<(), anyhow::Error> {
        let server1 = TestNomnomServer::spawn(pool.clone()).await?;
        let server2 = TestNomnomServer::spawn(pool).await?;

        assert_ne!(server1.addr(), server2.addr());
        assert!(server1.addr().ip().is_loopback());
        assert_eq!(server1.config().bind_address, "127.0.0.1:0");

        Ok(())
    }
}
