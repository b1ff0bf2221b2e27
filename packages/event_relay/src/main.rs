use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod handlers;
mod metrics;
mod registry;
mod ws;

use crate::config::FileConfig;
use crate::metrics::ServerMetrics;
use crate::ws::RelayState;

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
#[command(name = "relayd")]
#[command(about = "Best-effort fan-out relay for named client events")]
struct Cli {
    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a relay.toml configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Shared state handed to every route handler.
#[derive(Clone)]
pub(crate) struct AppState {
    pub relay: Arc<RelayState>,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<FileConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "relayd=debug,tower_http=debug,info"
    } else {
        "relayd=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    run_server(config).await
}

async fn run_server(config: FileConfig) -> Result<()> {
    info!("Starting relay server");
    info!(
        "Using configuration: host={}, port={}",
        config.server.host, config.server.port
    );

    let addr: SocketAddr = config.bind_addr()?;

    let state = AppState {
        relay: Arc::new(RelayState::new()),
        metrics: Arc::new(ServerMetrics::new()),
        config: Arc::new(config),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let actual_addr = listener.local_addr()?;
    info!("Relay server listening on http://{}", actual_addr);

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received shutdown signal, stopping");
    };

    // Immediate stop: the listener and all live connections are dropped,
    // nothing is drained.
    tokio::select! {
        result = axum::serve(listener, app) => result.context("Server error"),
        _ = shutdown_signal => Ok(()),
    }
}

/// Assemble the HTTP surface: liveness probe, health/metrics, and the relay
/// WebSocket endpoint.
pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/ws", get(handlers::relay_websocket_handler))
        // any other path gets the same liveness body the original served
        .fallback(handlers::root_handler)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
