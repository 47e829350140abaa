//! Mirrorbot - Discord channel mirroring bot
//!
//! Relays messages (and deletion notices) from a set of monitored channels
//! into a single destination channel. Administrators choose the channels
//! with the interactive `!setup` command.

mod common;
mod config;
mod discord;
mod relay;
mod setup;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use config::{load_and_validate, ConfigStore};
use discord::DiscordBotBuilder;
use relay::RelayState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Mirrorbot v{} starting...", env!("CARGO_PKG_VERSION"));

    let settings = load_and_validate().map_err(|e| {
        error!("Failed to load settings: {}", e);
        error!("Set DISCORD_TOKEN in the environment or in a .env file.");
        e
    })?;

    info!("Settings loaded successfully");
    info!("  Channel mapping: {}", settings.config_path);
    info!("  Deletion history: {} messages", settings.history_size);

    let state = RelayState::load(ConfigStore::new(&settings.config_path));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let discord_bot = DiscordBotBuilder::new(&settings, state, shutdown_rx)
        .build()
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {}", e);
            e
        })?;

    let mut discord_task = tokio::spawn(discord_bot.run());

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - disconnecting...");
            true
        }
        _ = &mut discord_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (Discord task already exited): {}", e);
        }
        let timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(timeout, discord_task).await {
            Ok(Ok(())) => info!("Discord client stopped gracefully"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
