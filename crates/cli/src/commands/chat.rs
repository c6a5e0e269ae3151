//! `palaver chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use palaver_assistant::{ConversationHub, Inbound};
use palaver_channels::{CLI_CHAT_ID, CliChannel};
use palaver_core::channel::Channel;
use palaver_core::message::ConversationKey;
use palaver_workflow::ReminderScheduler;

use super::load_context;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, ctx) = load_context()?;
    let key = ConversationKey::new("cli", CLI_CHAT_ID);

    if let Some(msg) = message {
        // Single message mode: reminders would never get a chance to fire.
        let hub = ConversationHub::new(ctx);
        eprint!("  Thinking...");
        let reply = hub.dispatch(key, Inbound::text(msg)).await;
        eprint!("\r              \r");
        println!("{reply}");
        hub.shutdown().await;
        return Ok(());
    }

    let (scheduler, mut fired) = ReminderScheduler::new();
    let scheduler = Arc::new(scheduler);
    let hub = ConversationHub::new(ctx.with_reminders(Arc::clone(&scheduler)));

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Palaver — Interactive Mode            ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.generation.model);
    println!("  Prompt:    {}", hub.context().initial_prompt);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type {}help for commands, 'exit' or Ctrl+D to quit.", config.command_prefix);
    println!();

    let channel = CliChannel::new();
    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;

    print!("  You > ");
    std::io::stdout().flush()?;

    loop {
        tokio::select! {
            incoming = rx.recv() => {
                let Some(result) = incoming else { break };
                match result {
                    Ok(chan_msg) => {
                        eprint!("  ...");
                        let reply = hub.dispatch(key.clone(), Inbound::from(&chan_msg)).await;
                        eprint!("\r     \r");
                        println!();
                        for line in reply.lines() {
                            println!("  Assistant > {line}");
                        }
                        println!();
                    }
                    Err(e) => {
                        eprintln!("  [Channel Error] {e}");
                        break;
                    }
                }
            }
            Some(reminder) = fired.recv() => {
                println!();
                println!("  ⏰ {}", reminder.message());
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    scheduler.shutdown();
    hub.shutdown().await;

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
