//! Stress Detector API Server
//!
//! Serves the latest background analysis and on-demand analysis of uploaded images.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use stress_monitor::{
    CaptureHandle, CaptureLoop, CaptureStatus, MonitorError, ResultReader, ResultStore,
    StressPipeline,
};
use thiserror::Error;
use tokio::sync::watch;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;

pub use config::AppConfig;
pub use error::ApiError;

use rate_limit::{create_governor_config, RateLimitConfig, UploadLimiter};

/// Server startup errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid log level: {0}")]
    LogLevel(String),
    #[error("Failed to set tracing subscriber: {0}")]
    Logging(String),
    #[error("Invalid rate limit: per_second={0}, burst_size={1}")]
    RateLimit(u64, u32),
    #[error("Failed to start stress pipeline: {0}")]
    Pipeline(#[from] MonitorError),
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers
pub struct AppState {
    /// Inference pipeline for on-demand analysis
    pub pipeline: Arc<StressPipeline>,
    /// Read side of the latest result store
    pub results: ResultReader,
    /// Capture loop status, if a live source is configured
    pub capture: Option<watch::Receiver<CaptureStatus>>,
    /// Prometheus handle, if a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(pipeline: Arc<StressPipeline>, results: ResultReader) -> Self {
        Self {
            pipeline,
            results,
            capture: None,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_capture(mut self, capture: watch::Receiver<CaptureStatus>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_metrics(mut self, metrics: PrometheusHandle) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    build_router(state, None)
}

/// Create the application router with upload rate limiting.
///
/// Must be served with connection info for the per-IP limiter.
pub fn create_rate_limited_router(
    state: Arc<AppState>,
    limits: &RateLimitConfig,
) -> Result<Router, ServerError> {
    let config = create_governor_config(limits)
        .ok_or(ServerError::RateLimit(limits.per_second, limits.burst_size))?;
    Ok(build_router(state, Some(GovernorLayer { config })))
}

fn build_router(state: Arc<AppState>, limiter: Option<UploadLimiter>) -> Router {
    let mut analyze = post(routes::stress::analyze_stress)
        .layer(DefaultBodyLimit::max(routes::stress::MAX_UPLOAD_BYTES));
    if let Some(limiter) = limiter {
        analyze = analyze.layer(limiter);
    }

    Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .route("/latest-stress-level", get(routes::stress::latest_stress_level))
        .route("/analyze-stress", analyze)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) -> Result<(), ServerError> {
    let level: Level = level
        .parse()
        .map_err(|_| ServerError::LogLevel(level.to_string()))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| ServerError::Logging(e.to_string()))
}

/// Install the Prometheus recorder; metrics are skipped if it cannot be installed
fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    }
}

/// Start the capture loop on the configured live source
fn start_capture(
    config: &AppConfig,
    pipeline: Arc<StressPipeline>,
) -> (ResultReader, Option<CaptureHandle>) {
    let (writer, reader) = ResultStore::channel();

    if !config.source.is_enabled() {
        info!("No live source configured; serving on-demand analysis only");
        return (reader, None);
    }

    let source = config.source.clone();
    let handle = CaptureLoop::new(pipeline, writer).start(move || source.open());
    (reader, Some(handle))
}

/// Run the server until Ctrl-C, then stop the capture loop
pub async fn run_server(config: AppConfig) -> Result<(), ServerError> {
    let metrics = init_metrics();

    // Models are a startup precondition
    let pipeline = Arc::new(StressPipeline::load(&config.monitor)?);

    let (results, capture) = start_capture(&config, Arc::clone(&pipeline));

    let mut state = AppState::new(pipeline, results);
    if let Some(handle) = &capture {
        state = state.with_capture(handle.subscribe());
    }
    if let Some(metrics) = metrics {
        state = state.with_metrics(metrics);
    }

    let mut app = create_rate_limited_router(Arc::new(state), &config.rate_limit)?;
    if config.cors_allow_any {
        app = app.layer(CorsLayer::permissive());
    }

    info!("Starting API server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = capture {
        let state = handle.shutdown().await;
        info!("Capture loop ended: {:?}", state);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
