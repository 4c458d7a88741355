//! `pocketmed status`: Show the effective configuration.

use pocketmed_config::AppConfig;

fn presence(set: bool) -> &'static str {
    if set { "set" } else { "missing" }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🩺 PocketMed Status");
    println!("===================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    println!("  Max tokens:   {}", config.default_max_tokens);
    println!("  Timeout:      {}s", config.request_timeout_secs);
    println!("  API key:      {}", presence(config.provider_api_key().is_some()));
    println!(
        "  Bot token:    {}",
        presence(config.telegram.bot_token.as_deref().is_some_and(|t| !t.is_empty()))
    );
    println!("  Allowed:      {}", config.telegram.allowed_users.join(", "));
    println!(
        "  Keywords:     {}",
        config
            .keywords
            .prefixes()
            .iter()
            .map(|(name, keyword)| format!("{name}={keyword}"))
            .collect::<Vec<_>>()
            .join("  ")
    );
    println!("  Summary:      {}", config.keywords.summary);
    println!(
        "  Prompt:       {}",
        if config.assistant.system_prompt.is_some() { "custom" } else { "built-in" }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `pocketmed onboard` first");
    }

    Ok(())
}
