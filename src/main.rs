//! Review Arcade Session Server
//!
//! Boots the process-wide session registry, builds the REST + WebSocket
//! router, and serves it on the configured bind address.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use review_arcade::http::{self, AppState};
use review_arcade::session::Registry;
use review_arcade::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(ServerConfig::from_env());
    info!(bind_addr = %config.bind_addr, "starting review-arcade-server v{}", review_arcade::VERSION);

    let registry = Registry::new((*config).clone());
    registry.spawn_reaper();

    let state = AppState {
        registry,
        config: config.clone(),
    };
    let router = http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
