//! `pocketmed doctor`: Diagnose configuration problems.

use std::sync::Arc;

use pocketmed_channels::{ChannelRegistry, TelegramChannel, TelegramConfig};
use pocketmed_config::AppConfig;
use pocketmed_core::provider::Provider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 PocketMed Doctor — Configuration Diagnostics");
    println!("==============================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file — defaults and environment only (`pocketmed onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    match config.require_credentials(false) {
        Ok(()) => println!("  ✅ Model API key configured ({})", config.default_provider),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    let has_token = config
        .telegram
        .bot_token
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    if has_token {
        println!("  ✅ Telegram bot token configured");
    } else {
        println!("  ❌ No Telegram bot token — `pocketmed serve` will refuse to start");
        issues += 1;
    }

    if config.telegram.allowed_users.is_empty() {
        println!("  ⚠️  telegram.allowed_users is empty — nobody can talk to the bot");
        issues += 1;
    }

    if issues == 0 {
        let router = pocketmed_providers::router::build_from_config(&config);
        if let Some(provider) = router.default() {
            match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
                Ok(false) => {
                    println!("  ⚠️  Provider '{}' did not respond as expected", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider '{}' check failed: {e}", provider.name());
                    issues += 1;
                }
            }
        }

        let mut registry = ChannelRegistry::new();
        registry.register(Arc::new(TelegramChannel::new(TelegramConfig {
            allowed_users: config.telegram.allowed_users.clone(),
            ..TelegramConfig::new(config.telegram.bot_token.clone().unwrap_or_default())
        })));
        for (name, healthy) in registry.health_check_all().await {
            if healthy {
                println!("  ✅ Channel '{name}' reachable");
            } else {
                println!("  ❌ Channel '{name}' rejected the credentials or is unreachable");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
