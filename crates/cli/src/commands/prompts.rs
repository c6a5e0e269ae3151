//! `palaver prompts`: List the saved system prompts.

use std::sync::Arc;

use palaver_assistant::PromptRegistry;
use palaver_config::AppConfig;
use palaver_memory::PromptFile;

pub async fn run(names_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = PromptRegistry::open(Arc::new(PromptFile::new(config.prompts_file())))
        .map_err(|e| format!("Failed to open prompt registry: {e}"))?;

    if names_only {
        for name in registry.names() {
            println!("{name}");
        }
    } else {
        print!("{}", registry.listing());
    }

    Ok(())
}
