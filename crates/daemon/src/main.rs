// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary entry point: load configuration, bootstrap the Topology Store
//! and adapters, and serve the HTTP surface until shutdown.

use rke2_daemon::{bootstrap, config, routes};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let state = bootstrap().await?;
    let addr = config::bind_addr()?;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "rke2-orchestratord listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to install Ctrl+C handler");
            }
            info!("shutdown signal received, draining in-flight requests");
        })
        .await?;

    Ok(())
}
