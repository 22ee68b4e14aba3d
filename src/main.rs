//! Crash Round Server
//!
//! Runs provably-fair crash rounds for WebSocket clients.

use std::sync::Arc;
use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crash_round::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();

    info!("Crash Round Server v{}", VERSION);
    info!("Bind address: {}", config.bind_addr);
    info!(
        "Countdown: {}s, tick: {:?}, step: {}, crash delay: {:?}",
        config.game.countdown_secs,
        config.game.multiplier_tick,
        config.game.multiplier_step,
        config.game.crash_delay,
    );
    info!("Starting balance: {}", config.game.starting_balance);

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await.context("crash round server stopped")?;

    info!("Server stopped");
    Ok(())
}
