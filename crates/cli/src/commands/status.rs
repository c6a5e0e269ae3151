//! `palaver status`: Show configuration and store status.

use palaver_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let g = &config.generation;

    let channels: Vec<&str> = config
        .channels_config
        .iter()
        .filter(|(_, c)| c.enabled)
        .map(|(name, _)| name.as_str())
        .collect();

    println!("Palaver Status");
    println!("==============");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Data dir:       {}", config.data_dir.display());
    println!("  Provider:       {}", config.default_provider);
    println!("  API key:        {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Model:          {}", g.model);
    println!("  Temperature:    {}", g.temperature);
    println!("  Top p:          {}", g.top_p);
    println!("  Hotswap:        {} <-> {}", config.hotswap_models[0], config.hotswap_models[1]);
    println!("  Prefix:         {}", config.command_prefix);
    println!("  Initial prompt: {}", config.initial_prompt);
    println!("  Models known:   {}", config.models.len());
    println!("  Idle expiry:    {}s (0 = never)", config.conversation_idle_secs);
    println!(
        "  Channels:       {}",
        if channels.is_empty() { "none".to_string() } else { channels.join(", ") }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `palaver onboard` first");
    }

    if config.prompts_file().exists() {
        println!("  ✅ Prompt registry found");
    } else {
        println!("  ⚠️  No prompt registry yet, it is created on first use");
    }

    let saved = std::fs::read_dir(config.threads_dir())
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0);
    println!("  Saved threads:  {saved}");

    Ok(())
}
