//! AeroGuard Service - Background AQI collector and HTTP API.
//!
//! Run with: `cargo run -p aeroguard-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use aeroguard_service::{AppState, Collector, Config, StorageBackend, api, build_state, ws};

/// AeroGuard Service - Background AQI collector and HTTP API.
#[derive(Parser, Debug)]
#[command(name = "aeroguard-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// History file path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Provider API token (overrides config).
    #[arg(long, env = "AEROGUARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Disable background collector (API only mode).
    #[arg(long)]
    no_collector: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aeroguard_service=info".parse()?)
                .add_directive("aeroguard_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(path) = args.database {
        config.storage.path = Some(path);
    }
    if let Some(token) = args.token {
        config.source.token = Some(token);
    }

    config.validate()?;

    match config.storage.resolved_path() {
        Some(path) => info!("Opening {:?} history at {:?}", config.storage.backend, path),
        None => info!("Using in-memory history"),
    }
    if config.storage.backend == StorageBackend::Memory {
        info!("History will not survive a restart");
    }
    let store = config.storage.open()?;
    let source = config.source.build()?;
    info!(
        "Monitoring {} location(s) via {}, {} estimator",
        config.locations.len(),
        source.name(),
        config.forecast.estimator
    );

    let addr: SocketAddr = config.server.bind.parse()?;
    let state = build_state(config, source, store);

    let collector = Collector::new(Arc::clone(&state));
    if !args.no_collector {
        collector.start().await;
    } else {
        info!("Background collector disabled");
    }

    let app = Router::new()
        .merge(api::router())
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    if !collector.stop(Duration::from_secs(10)).await {
        info!("Collector task aborted during shutdown");
    }

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    state.collector.signal_stop();
}
