//! Test server harness for E2E testing
//!
//! Provides `TestConferenceServer` for spawning a real webhook server backed
//! by the recording `MockGateway`.

use common::types::PhoneNumber;
use conference_service::coordinator::{Coordinator, CoordinatorSettings};
use conference_service::gateway::mock::MockGateway;
use conference_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// System number used by the harness.
pub const SYSTEM_NUMBER: &str = "+19195550000";

/// Organizer number used by the harness.
pub const ORGANIZER: &str = "+19195550001";

/// Test harness for spawning the conference service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let server = TestConferenceServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestConferenceServer {
    addr: SocketAddr,
    mock: Arc<MockGateway>,
    coordinator: Arc<Coordinator>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestConferenceServer {
    /// Settings the harness uses unless told otherwise.
    pub fn default_settings() -> CoordinatorSettings {
        CoordinatorSettings {
            system_number: PhoneNumber::parse(SYSTEM_NUMBER)
                .expect("harness system number is valid"),
            organizer: PhoneNumber::parse(ORGANIZER).expect("harness organizer is valid"),
            min_participants: 1,
            max_participants: 20,
            fanout_concurrency: 4,
            operation_timeout: Duration::from_secs(5),
        }
    }

    /// Spawn a server with [`Self::default_settings`].
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Self::default_settings()).await
    }

    /// Spawn a new test server instance.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Talk to a fresh `MockGateway`
    /// - Start the HTTP server in the background
    pub async fn spawn_with(settings: CoordinatorSettings) -> Result<Self, anyhow::Error> {
        let mock = Arc::new(MockGateway::new());
        let coordinator = Arc::new(Coordinator::new(mock.clone(), settings));
        let state = Arc::new(AppState {
            coordinator: Arc::clone(&coordinator),
        });

        // Standalone recorder; installing a global one twice per process fails
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            mock,
            coordinator,
            client: reqwest::Client::new(),
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

    /// The gateway the server talks to.
    pub fn mock(&self) -> &Arc<MockGateway> {
        &self.mock
    }

    /// The coordinator behind the routes.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// POST a raw body to `path`; returns status and body.
    pub async fn post_raw(&self, path: &str, body: &str) -> Result<(u16, String), anyhow::Error> {
        let response = self
            .client
            .post(format!("{}{}", self.url(), path))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await?;
        let status = response.status().as_u16();
        Ok((status, response.text().await?))
    }

    /// Deliver an SMS webhook; returns the response status.
    pub async fn post_message(&self, from: &str, text: &str) -> Result<u16, anyhow::Error> {
        let body = serde_json::json!({ "from": from, "to": SYSTEM_NUMBER, "text": text });
        let (status, _) = self.post_raw("/message", &body.to_string()).await?;
        Ok(status)
    }

    /// Deliver an inbound-call webhook; returns the response status.
    pub async fn post_voice(&self, call_id: &str) -> Result<u16, anyhow::Error> {
        let body = serde_json::json!({ "callId": call_id, "eventType": "answer" });
        let (status, _) = self.post_raw("/voice", &body.to_string()).await?;
        Ok(status)
    }
}

impl Drop for TestConferenceServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
