//! `palaver daemon`: Serve every channel enabled in config.

use std::sync::Arc;

use palaver_assistant::{ConversationHub, Inbound};
use palaver_channels::ChannelRegistry;
use palaver_workflow::ReminderScheduler;
use tracing::{debug, info, warn};

use super::load_context;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (config, ctx) = load_context()?;

    let channels = Arc::new(ChannelRegistry::from_config(&config));
    if channels.is_empty() {
        return Err("No channels enabled. Add one under [channels_config] in config.toml.".into());
    }

    let (scheduler, mut fired) = ReminderScheduler::new();
    let scheduler = Arc::new(scheduler);
    let mut hub = ConversationHub::new(ctx.with_reminders(Arc::clone(&scheduler)));
    if let Some(idle) = config.conversation_idle_timeout() {
        hub = hub.with_idle_timeout(idle);
    }
    let hub = Arc::new(hub);

    println!("Palaver Daemon — Starting");
    println!("   Channels: {}", channels.list().join(", "));
    println!("   Model:    {}", config.generation.model);
    println!("   Prompt:   {}", hub.context().initial_prompt);
    match config.conversation_idle_timeout() {
        Some(idle) => println!("   Idle:     conversations expire after {}s", idle.as_secs()),
        None => println!("   Idle:     conversations never expire"),
    }

    let mut inbound = channels
        .start_all()
        .await
        .map_err(|e| format!("Failed to start channels: {e}"))?;
    info!(channels = channels.len(), "Daemon started");

    // Fired reminders go back to the conversation that set them.
    let reminder_channels = Arc::clone(&channels);
    let reminder_task = tokio::spawn(async move {
        while let Some(reminder) = fired.recv().await {
            info!(id = reminder.id, target = %reminder.target, "Delivering reminder");
            if let Err(e) = reminder_channels
                .send_to(&reminder.target.channel, &reminder.target.chat_id, &reminder.message())
                .await
            {
                warn!(id = reminder.id, error = %e, "Failed to deliver reminder");
            }
        }
    });

    loop {
        tokio::select! {
            incoming = inbound.recv() => {
                let Some((channel_name, result)) = incoming else {
                    info!("All channels closed");
                    break;
                };
                let msg = match result {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(channel = %channel_name, error = %e, "Channel error");
                        continue;
                    }
                };

                let key = msg.conversation_key();
                debug!(conversation = %key, sender = %msg.sender_id, "Inbound message");

                // Enqueue here so each conversation keeps arrival order.
                let reply_rx = hub.enqueue(key.clone(), Inbound::from(&msg)).await;
                let channels = Arc::clone(&channels);
                tokio::spawn(async move {
                    let Ok(reply) = reply_rx.await else {
                        warn!(conversation = %key, "Conversation worker dropped the reply");
                        return;
                    };
                    if let Err(e) = channels.send_to(&channel_name, &key.chat_id, &reply).await {
                        warn!(conversation = %key, error = %e, "Failed to send reply");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    scheduler.shutdown();
    hub.shutdown().await;
    channels.stop_all().await;
    reminder_task.abort();

    println!("Palaver Daemon — Stopped");
    Ok(())
}
