//! Test server harness for E2E testing
//!
//! Provides `TestAuthzServer` for spawning real authorization service
//! instances in tests.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use oauth2_authz::auth::{AccessTokenValidator, OAuth2Module, ValidatorRegistry};
use oauth2_authz::config::Config;
use oauth2_authz::observability::metrics::init_metrics_recorder;
use oauth2_authz::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Returns the process-wide metrics handle, installing the recorder once.
///
/// Falls back to a standalone recorder if another test already installed
/// a global one.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Environment for a test server pointing at `token_info_endpoint`.
pub fn test_vars(token_info_endpoint: &str) -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("OAUTH2_VALIDATOR".to_string(), "rest".to_string()),
        (
            "OAUTH2_TOKEN_INFO_ENDPOINT".to_string(),
            token_info_endpoint.to_string(),
        ),
        ("OAUTH2_HTTP_TIMEOUT_SECONDS".to_string(), "5".to_string()),
    ])
}

/// Configuration for servers whose validator is injected directly.
///
/// The token-info endpoint is never contacted.
pub fn test_config() -> Config {
    Config::from_vars(&test_vars("http://127.0.0.1:9/tokeninfo"))
        .expect("test configuration should be valid")
}

/// Test harness for spawning the authorization service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let server = TestAuthzServer::spawn(test_vars(&format!("{}/tokeninfo", mock.uri()))).await?;
/// let response = reqwest::get(format!("{}/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestAuthzServer {
    addr: SocketAddr,
    config: Config,
    oauth2: Arc<OAuth2Module>,
    _handle: JoinHandle<()>,
}

impl TestAuthzServer {
    /// Spawn a server configured from `vars`, using the built-in validators.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn(vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let oauth2 = OAuth2Module::from_config(&config, &ValidatorRegistry::new())
            .map_err(|e| anyhow::anyhow!("Failed to build authorization module: {}", e))?;

        Self::start(config, oauth2).await
    }

    /// Spawn a server whose module uses `validator` instead of the
    /// configured one. Cache settings and required scopes come from `config`.
    pub async fn spawn_with_validator(
        config: Config,
        validator: Arc<dyn AccessTokenValidator>,
    ) -> Result<Self, anyhow::Error> {
        let oauth2 = OAuth2Module::new(
            validator,
            config.required_scopes.clone(),
            config.cache_enabled,
            config.cache_size,
        );

        Self::start(config, oauth2).await
    }

    async fn start(config: Config, oauth2: OAuth2Module) -> Result<Self, anyhow::Error> {
        let oauth2 = Arc::new(oauth2);
        let state = Arc::new(AppState {
            config: config.clone(),
            oauth2: Arc::clone(&oauth2),
        });

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

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
            config,
            oauth2,
            _handle: handle,
        })
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

    /// The authorization module serving this instance, for cache inspection.
    pub fn oauth2(&self) -> &OAuth2Module {
        &self.oauth2
    }
}

impl Drop for TestAuthzServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::valid_response;
    use oauth2_authz::auth::validator::mock::StubValidator;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let validator = Arc::new(StubValidator::returning(valid_response(&[])));
        let server = TestAuthzServer::spawn_with_validator(test_config(), validator).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["validator"], "rest");
        assert_eq!(body["cache_enabled"], true);

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let validator = Arc::new(StubValidator::returning(valid_response(&[])));
        let server = TestAuthzServer::spawn_with_validator(test_config(), validator).await?;

        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));

        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let mut vars = test_vars("http://127.0.0.1:9/tokeninfo");
        vars.insert("OAUTH2_CACHE_SIZE".to_string(), "lots".to_string());

        assert!(TestAuthzServer::spawn(vars).await.is_err());
    }
}
