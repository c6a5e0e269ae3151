//! `palaver onboard`: First-time setup.

use std::sync::Arc;

use palaver_assistant::PromptRegistry;
use palaver_config::AppConfig;
use palaver_memory::PromptFile;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Palaver — First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let fresh_config = !config_path.exists();
    if fresh_config {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    } else {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    }

    // Data dir may be overridden by the (possibly pre-existing) config.
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let threads_dir = config.threads_dir();
    if !threads_dir.exists() {
        std::fs::create_dir_all(&threads_dir)?;
        println!("✅ Created threads directory: {}", threads_dir.display());
    }

    let prompts_file = config.prompts_file();
    let registry = PromptRegistry::open(Arc::new(PromptFile::new(&prompts_file)))
        .map_err(|e| format!("Failed to seed prompt registry: {e}"))?;
    println!(
        "✅ Prompt registry at {} ({} prompt{})",
        prompts_file.display(),
        registry.len(),
        if registry.len() == 1 { "" } else { "s" }
    );

    if fresh_config {
        println!("\n📝 Next steps:");
        println!("   1. Set PALAVER_API_KEY or add api_key to {}", config_path.display());
        println!("   2. Run: palaver chat");
        println!("   3. Type {}help to see every command\n", config.command_prefix);
    }

    println!("🎉 Setup complete! Run `palaver chat` to start chatting.\n");

    Ok(())
}
