use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::AppState;
use crate::broker::BrokerContext;
use crate::config::{BrokerConfig, FileConfig};
use crate::error::BrokerError;
use crate::metrics::ServerMetrics;
use crate::qr::ImageEncoder;
use crate::registry::SessionRegistry;
use crate::rooms::RoomHub;

/// Deterministic stand-in for the QR encoder: `img:<url>`.
pub struct StubEncoder;

impl ImageEncoder for StubEncoder {
    fn encode(&self, content: &str) -> Result<String, BrokerError> {
        Ok(format!("img:{content}"))
    }
}

/// Encoder that takes `delay` per image.
pub struct SlowEncoder(pub std::time::Duration);

impl ImageEncoder for SlowEncoder {
    fn encode(&self, content: &str) -> Result<String, BrokerError> {
        std::thread::sleep(self.0);
        Ok(format!("img:{content}"))
    }
}

/// Encoder that always fails.
pub struct FailingEncoder;

impl ImageEncoder for FailingEncoder {
    fn encode(&self, _content: &str) -> Result<String, BrokerError> {
        Err(BrokerError::ImageEncoding("refused".into()))
    }
}

pub fn test_broker_context() -> Arc<BrokerContext> {
    test_broker_context_with(Arc::new(StubEncoder))
}

pub fn test_broker_context_with(encoder: Arc<dyn ImageEncoder>) -> Arc<BrokerContext> {
    Arc::new(BrokerContext {
        registry: Arc::new(SessionRegistry::new()),
        rooms: Arc::new(RoomHub::new()),
        encoder,
        secret: podium_auth::SessionSecret::new("test-secret").expect("secret"),
        base_path: "/".into(),
        metrics: Arc::new(ServerMetrics::new()),
    })
}

/// Build a fully-wired `AppState` whose presentation directory is a fresh
/// temp dir.
///
/// Returns `(AppState, TempDir)`; callers **must** hold the `TempDir` for
/// the lifetime of the test.
pub fn test_app_state(base_path: &str) -> (AppState, tempfile::TempDir) {
    test_app_state_with(base_path, Arc::new(StubEncoder))
}

/// Like [`test_app_state`], with a custom image encoder.
pub fn test_app_state_with(
    base_path: &str,
    encoder: Arc<dyn ImageEncoder>,
) -> (AppState, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let file_config = FileConfig {
        host: "127.0.0.1".into(),
        base_path: base_path.into(),
        presentation_path: tmp.path().to_path_buf(),
        hash_secret: Some("test-secret".into()),
        ..Default::default()
    };
    let config = BrokerConfig::from_file(&file_config).expect("config");
    let metrics = Arc::new(ServerMetrics::new());

    let broker = Arc::new(BrokerContext {
        registry: Arc::new(SessionRegistry::new()),
        rooms: Arc::new(RoomHub::new()),
        encoder,
        secret: config.secret.clone(),
        base_path: config.base_path.clone(),
        metrics: metrics.clone(),
    });

    let state = AppState {
        broker,
        config: Arc::new(config),
        metrics,
        shutdown: CancellationToken::new(),
    };
    (state, tmp)
}

/// Serve `state` on an ephemeral loopback port. Cancel the returned token
/// to stop the server.
pub async fn spawn_test_server(state: AppState) -> (SocketAddr, CancellationToken) {
    let shutdown = state.shutdown.clone();
    let app = crate::build_router(state).expect("router");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let token = shutdown.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
    });
    (addr, shutdown)
}
