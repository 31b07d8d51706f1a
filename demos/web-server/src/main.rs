//! Job-search API server with per-user sessions and live log streaming.
//!
//! Run with: cargo run -p dreamjob-server
//!
//! Any email works as a bearer token:
//!
//! ```text
//! curl -X POST -H 'Authorization: Bearer me@example.com' localhost:8000/session
//! websocat 'ws://localhost:8000/ws?token=me@example.com'
//! ```

mod api;
mod engine;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use dreamjob_session::{IdleSweeper, RegistryConfig, RegistryEvent, SessionRegistry};
use dreamjob_transport::{SharedAuthenticator, create_ws_router};
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api::{AppState, DevAuthenticator},
    engine::DemoFactory,
};

const DEFAULT_ADDR: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 8000);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = match std::env::var("DREAMJOB_ADDR") {
        Ok(raw) => raw.parse::<SocketAddr>().with_context(|| format!("invalid DREAMJOB_ADDR: {raw}"))?,
        Err(_) => DEFAULT_ADDR,
    };

    let config = RegistryConfig::from_env();
    tracing::info!(
        idle_timeout_secs = config.idle_timeout_secs,
        sweep_interval_secs = config.sweep_interval_secs,
        "Session registry configured"
    );

    let factory = DemoFactory::with_scrape_delay(Duration::from_millis(250));
    let registry = Arc::new(SessionRegistry::new(factory, config));
    let authenticator: SharedAuthenticator = Arc::new(DevAuthenticator);

    let sweeper = IdleSweeper::spawn(&registry);
    tokio::spawn(log_events(registry.subscribe_events()));

    let state = AppState {
        registry: Arc::clone(&registry),
        authenticator: Arc::clone(&authenticator),
    };

    let app = api::router(state)
        .merge(create_ws_router(Arc::clone(&registry), authenticator))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    let removed = registry.shutdown().await;
    tracing::info!(removed, "Shutdown complete");
    Ok(())
}

/// Log registry lifecycle events until the registry goes away.
async fn log_events(mut events: tokio::sync::broadcast::Receiver<RegistryEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::debug!(?event, "Registry event"),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Registry event log lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}
