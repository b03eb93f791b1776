use anyhow::{Context, Result, bail};
use axum::{Router, http::HeaderValue, routing::get};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod broker;
mod config;
mod error;
mod handlers;
mod metrics;
mod qr;
mod registry;
mod rooms;
mod session;
#[cfg(test)]
mod test_helpers;
mod urls;

use crate::broker::BrokerContext;
use crate::config::{BrokerConfig, CliOverrides, CorsSetting, DEFAULT_CONFIG_FILE, FileConfig};
use crate::metrics::ServerMetrics;
use crate::qr::QrEncoder;
use crate::registry::SessionRegistry;
use crate::rooms::RoomHub;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "podium")]
#[command(about = "Broker for remote controlling and mirroring a web presentation")]
struct Cli {
    /// Config file (defaults to ./podium.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the web server
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// URL prefix the broker is served under (useful behind a reverse proxy)
    #[arg(short, long)]
    base_path: Option<String>,

    /// Directory containing the presentations
    #[arg(short = 'e', long)]
    presentation_path: Option<PathBuf>,

    /// Directory with the remote control UI, served at {base}_remote/
    #[arg(long)]
    remote_ui_path: Option<PathBuf>,

    /// Secret used to resume a session after the presentation is reloaded
    #[arg(short = 'a', long)]
    hash_secret: Option<String>,

    /// Comma separated list of allowed origins; '*' allows all
    #[arg(short, long = "cors-origin")]
    origin: Option<String>,

    /// Assume https when no X-Forwarded-Proto header is present
    #[arg(long)]
    https: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            host: self.host.clone(),
            port: self.port,
            base_path: self.base_path.clone(),
            presentation_path: self.presentation_path.clone(),
            remote_ui_path: self.remote_ui_path.clone(),
            hash_secret: self.hash_secret.clone(),
            cors_origin: self.origin.clone(),
            https: self.https.then_some(true),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    /// Shared broker services (registry, rooms, encoder, secret)
    pub broker: Arc<BrokerContext>,
    pub config: Arc<BrokerConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
    /// Cancelled on shutdown; open WebSocket connections watch it
    pub shutdown: CancellationToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "podium=debug,tower_http=debug,info"
    } else {
        "podium=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config_file = match &cli.config {
        Some(path) if !path.exists() => bail!("Config file not found: {}", path.display()),
        Some(path) => path.clone(),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };
    let file_config: FileConfig = config::load_config(&config_file, &cli.overrides())
        .extract()
        .context("Invalid configuration")?;
    let config = BrokerConfig::from_file(&file_config)?;

    info!("Starting Podium - presentation broker");
    if config.secret_generated {
        warn!("No hash_secret configured; resumption will not survive a restart");
    }
    info!("Session secret fingerprint: {}", config.secret.fingerprint());
    if !config.presentation_path.is_dir() {
        warn!(
            "Presentation path {} is not a directory",
            config.presentation_path.display()
        );
    }

    let metrics = Arc::new(ServerMetrics::new());
    let broker = Arc::new(BrokerContext {
        registry: Arc::new(SessionRegistry::new()),
        rooms: Arc::new(RoomHub::new()),
        encoder: Arc::new(QrEncoder),
        secret: config.secret.clone(),
        base_path: config.base_path.clone(),
        metrics: metrics.clone(),
    });
    let shutdown = CancellationToken::new();
    let bind_addr = config.bind_addr;
    let base_path = config.base_path.clone();

    let app_state = AppState {
        broker,
        config: Arc::new(config),
        metrics,
        shutdown: shutdown.clone(),
    };
    let app = build_router(app_state)?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    let actual_addr = listener.local_addr()?;

    info!("Podium listening on http://{}", actual_addr);
    info!("");
    info!("  GET    {base_path}         - Presentation index");
    info!("  GET    {base_path}ws       - Broker WebSocket");
    info!("  GET    {base_path}health   - Health check");
    info!("  GET    {base_path}metrics  - Server metrics");

    // Create shutdown signal handler
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, closing connections...");
        shutdown.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

pub(crate) fn build_router(state: AppState) -> Result<Router> {
    let base = state.config.base_path.clone();

    let mut app = Router::new()
        .route(&base, get(handlers::presentation_index))
        .route(&format!("{base}ws"), get(handlers::broker_websocket_handler))
        .route(&format!("{base}health"), get(handlers::health_handler))
        .route(&format!("{base}metrics"), get(handlers::metrics_handler));

    if let Some(ref remote_ui) = state.config.remote_ui_path {
        app = app.nest_service(&format!("{base}_remote"), ServeDir::new(remote_ui));
    }

    let app = app
        .fallback(handlers::presentation_files)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan));

    let app = match cors_layer(&state.config.cors)? {
        Some(cors) => app.layer(cors),
        None => app,
    };

    Ok(app.with_state(state))
}

fn cors_layer(setting: &CorsSetting) -> Result<Option<CorsLayer>> {
    let origin = match setting {
        CorsSetting::Disabled => return Ok(None),
        CorsSetting::Any => AllowOrigin::from(Any),
        CorsSetting::List(origins) => {
            let origins = origins
                .iter()
                .map(|o| {
                    o.parse::<HeaderValue>()
                        .with_context(|| format!("Invalid CORS origin: {o}"))
                })
                .collect::<Result<Vec<_>>>()?;
            AllowOrigin::list(origins)
        }
    };
    Ok(Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use crate::test_helpers::test_app_state;

    #[test]
    fn test_cli_overrides_only_set_fields() {
        let cli = Cli::parse_from(["podium", "--port", "9000", "--https"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.port, Some(9000));
        assert_eq!(overrides.https, Some(true));
        assert!(overrides.host.is_none());

        let cli = Cli::parse_from(["podium"]);
        assert!(cli.overrides().https.is_none());
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer(&CorsSetting::Disabled).unwrap().is_none());
        assert!(cors_layer(&CorsSetting::Any).unwrap().is_some());
        assert!(cors_layer(&CorsSetting::List(vec!["bad\norigin".into()])).is_err());
    }

    #[tokio::test]
    async fn test_routes_respect_base_path() {
        let (state, _tmp) = test_app_state("/talks");
        let app = build_router(state).unwrap();

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/talks/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_header_for_allowed_origin() {
        let (mut state, _tmp) = test_app_state("/");
        let mut config = (*state.config).clone();
        config.cors = CorsSetting::List(vec!["http://deck.test".into()]);
        state.config = Arc::new(config);
        let app = build_router(state).unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://deck.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://deck.test"
        );
    }

    #[tokio::test]
    async fn test_remote_ui_served_when_configured() {
        let (mut state, tmp) = test_app_state("/");
        let ui = tmp.path().join("remote-ui");
        std::fs::create_dir_all(ui.join("ui")).unwrap();
        std::fs::write(ui.join("ui/index.html"), "remote").unwrap();
        let mut config = (*state.config).clone();
        config.remote_ui_path = Some(ui);
        state.config = Arc::new(config);
        let app = build_router(state).unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/_remote/ui/index.html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"remote");
    }
}
