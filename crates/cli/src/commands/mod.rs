pub mod chat;
pub mod daemon;
pub mod onboard;
pub mod prompts;
pub mod status;

use std::sync::Arc;

use palaver_assistant::AssistantContext;
use palaver_config::AppConfig;

/// Load config and build the shared assistant context from it.
pub(crate) fn load_context() -> Result<(AppConfig, AssistantContext), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PALAVER_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = palaver_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let ctx = AssistantContext::from_config(&config, Arc::clone(&provider))
        .map_err(|e| format!("Failed to open prompt registry: {e}"))?;
    Ok((config, ctx))
}
