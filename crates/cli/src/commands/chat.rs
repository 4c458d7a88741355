//! `pocketmed chat`: Interactive or single-message chat in the terminal.

use std::sync::Arc;

use pocketmed_assistant::Runtime;
use pocketmed_channels::cli::CLI_SENDER;
use pocketmed_channels::{ChannelRegistry, CliChannel};
use pocketmed_config::AppConfig;
use pocketmed_core::store::UserId;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Err(e) = config.require_credentials(false) {
        eprintln!();
        eprintln!("  ERROR: {e}");
        eprintln!();
        eprintln!("  Config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err(e.into());
    }

    let handler = super::build_handler(&config)?;

    if let Some(msg) = message {
        // Single message mode
        let user = UserId::scoped("cli", CLI_SENDER);
        eprint!("  Thinking...");
        let reply = handler.handle(&user, &msg).await;
        eprint!("\r              \r");
        println!("{}", reply.text);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        PocketMed — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!();
    for line in handler.greeting().text.lines() {
        println!("  PocketMed > {line}");
    }
    println!();
    println!("  Profile: {} ...  {} ...  {} ...  {} ...  ({} to review)",
        config.keywords.age,
        config.keywords.gender,
        config.keywords.diabetes_type,
        config.keywords.medications,
        config.keywords.summary,
    );
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut registry = ChannelRegistry::new();
    registry.register(Arc::new(CliChannel::new()));

    Runtime::new(Arc::new(registry), handler)
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
