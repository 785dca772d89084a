pub mod http;

use crate::{config::Config, media::Resolver};
use anyhow::{Context, Result};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tokio::signal;
use tracing::{info, warn};

pub async fn run(config: Config) -> Result<()> {
    let resolver = Resolver::from_config(&config)
        .await
        .context("Failed to initialize resolver")?;

    let state = http::AppState {
        resolver: Arc::new(resolver),
    };
    let app = http::router(state, &config.server.cors_origin)?;

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid listen host {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }
}
