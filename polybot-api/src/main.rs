//! Polybot ingestion server
//!
//! Runs the poll scheduler and the market stream, and serves the state table
//! and relayed events over HTTP and WebSocket.

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use polybot_core::StreamError;
use polybot_services::{EventStore, IngestConfig, IngestContext};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How often expired relay events are purged from the event store
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<IngestContext>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables; missing files are fine
    for file in [".env.local", ".env"] {
        if let Err(e) = dotenvy::from_filename(file) {
            if !matches!(e, dotenvy::Error::Io(_)) {
                eprintln!("Warning: Failed to load {}: {}", file, e);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,polybot_api=debug,polybot_services=debug")
            }),
        )
        .init();

    info!("Starting Polybot ingestion server");

    let config = IngestConfig::from_env()?;
    info!(
        "Polling {} every {:?} (max {} markets), streaming from {}",
        config.rest_url, config.update_interval, config.max_markets, config.ws_url
    );

    let ctx = Arc::new(IngestContext::new(config)?);

    ctx.scheduler.start().await;

    // Market stream: initial connect, then listen until closed or exhausted
    let stream = Arc::clone(&ctx.stream);
    let stream_task = tokio::spawn(async move {
        match stream.connect().await {
            Ok(()) | Err(StreamError::Closed) => {}
            Err(e) => warn!("Initial market stream connect failed, will retry: {}", e),
        }
        if let Err(e) = stream.listen().await {
            error!("Market stream stopped: {}", e);
        }
    });

    let store = Arc::clone(&ctx.store);
    let purge_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = store.purge_expired().await {
                warn!("Failed to purge expired events: {}", e);
            }
        }
    });

    let state = AppState {
        ctx: Arc::clone(&ctx),
    };

    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(cors)
        .with_state(state);

    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down ingestion engine...");
    purge_task.abort();
    ctx.shutdown().await;
    if let Err(e) = stream_task.await {
        error!("Market stream task ended abnormally: {}", e);
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
