//! `pocketmed serve`: Run the Telegram bot.

use std::sync::Arc;

use pocketmed_assistant::Runtime;
use pocketmed_channels::{ChannelRegistry, TelegramChannel, TelegramConfig};
use pocketmed_config::AppConfig;
use pocketmed_core::channel::Channel;
use tracing::{info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Both credentials are mandatory; refuse to start without them
    config.require_credentials(true)?;

    let handler = super::build_handler(&config)?;

    let telegram = TelegramChannel::new(TelegramConfig {
        allowed_users: config.telegram.allowed_users.clone(),
        poll_timeout_secs: config.telegram.poll_timeout_secs,
        ..TelegramConfig::new(config.telegram.bot_token.clone().unwrap_or_default())
    });

    match telegram.health_check().await {
        Ok(true) => info!("Telegram bot token accepted"),
        Ok(false) => warn!("Telegram did not confirm the bot token"),
        Err(e) => warn!(error = %e, "Telegram health check failed"),
    }

    let mut registry = ChannelRegistry::new();
    registry.register(Arc::new(telegram));

    let runtime = Runtime::new(Arc::new(registry), handler)
        .with_reply_threading(config.telegram.reply_to_message);

    println!("🩺 PocketMed Telegram bot is running");
    println!("   Provider: {}", config.default_provider);
    println!("   Model:    {}", config.default_model);
    println!("   Press Ctrl+C to stop.");

    runtime
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    println!("👋 PocketMed stopped.");
    Ok(())
}
