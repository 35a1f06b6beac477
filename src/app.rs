//! Service assembly and lifecycle.

use crate::config::Config;
use crate::portal::dispatcher::{DispatchService, Dispatcher};
use crate::state::AppState;
use crate::web;
use anyhow::Context;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Builds the router and serves it until a shutdown signal arrives.
pub async fn run(config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or(config.port);
    let config = Arc::new(config);

    // Fail fast on a malformed cutover instant instead of silently staying
    // in test mode forever.
    let production_start = config.production_start()?;

    let dispatcher: Arc<dyn DispatchService> = Arc::new(Dispatcher::new(Arc::clone(&config)));
    let state = AppState::new(Arc::clone(&config), dispatcher);
    let router = web::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        %addr,
        mode = config.mode_at(Utc::now()),
        production_start = %production_start.to_rfc3339(),
        portal = %config.portal_base_url,
        "listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
