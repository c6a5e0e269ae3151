//! One worker task per conversation.
//!
//! Each worker owns its conversation's [`CommandRouter`] and handles that
//! conversation's utterances strictly in arrival order. Different
//! conversations run concurrently; a slow provider call in one never holds
//! up another.
//!
//! With an idle timeout set, a worker that hears nothing for that long
//! retires itself. The next utterance for its conversation starts fresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use palaver_core::channel::ChannelMessage;
use palaver_core::message::{ContentPart, ConversationKey};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::AssistantContext;
use crate::router::CommandRouter;

/// One utterance as the router sees it.
#[derive(Debug, Clone, Default)]
pub struct Inbound {
    pub text: String,
    pub attachments: Vec<ContentPart>,
}

impl Inbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

impl From<&ChannelMessage> for Inbound {
    fn from(msg: &ChannelMessage) -> Self {
        Self {
            text: msg.content.clone(),
            attachments: msg.attachment_parts(),
        }
    }
}

struct Job {
    inbound: Inbound,
    reply: oneshot::Sender<String>,
}

struct Worker {
    tx: mpsc::UnboundedSender<Job>,
    handle: JoinHandle<()>,
    /// Tells a retiring worker apart from its replacement.
    generation: u64,
}

type Workers = Arc<Mutex<HashMap<ConversationKey, Worker>>>;

pub struct ConversationHub {
    ctx: AssistantContext,
    workers: Workers,
    idle_timeout: Option<Duration>,
    spawned: AtomicU64,
}

impl ConversationHub {
    pub fn new(ctx: AssistantContext) -> Self {
        Self {
            ctx,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: None,
            spawned: AtomicU64::new(0),
        }
    }

    /// Retire conversations that stay quiet for `idle`.
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = Some(idle);
        self
    }

    pub fn context(&self) -> &AssistantContext {
        &self.ctx
    }

    /// Queue an utterance for its conversation, starting a worker if there
    /// is none. The reply arrives on the returned receiver.
    pub async fn enqueue(&self, key: ConversationKey, inbound: Inbound) -> oneshot::Receiver<String> {
        let (reply, reply_rx) = oneshot::channel();
        let mut job = Job { inbound, reply };

        let mut workers = self.workers.lock().await;
        // A worker that died is replaced once; a fresh worker cannot refuse.
        for _ in 0..2 {
            let worker = workers
                .entry(key.clone())
                .or_insert_with(|| self.spawn_worker(key.clone()));
            match worker.tx.send(job) {
                Ok(()) => return reply_rx,
                Err(mpsc::error::SendError(returned)) => {
                    warn!(conversation = %key, "Conversation worker gone, restarting it");
                    workers.remove(&key);
                    job = returned;
                }
            }
        }
        reply_rx
    }

    /// Queue an utterance and wait for its reply.
    pub async fn dispatch(&self, key: ConversationKey, inbound: Inbound) -> String {
        let conversation = key.to_string();
        match self.enqueue(key, inbound).await.await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(conversation = %conversation, "Conversation worker dropped the reply");
                "Sorry, something went wrong handling that message.".to_string()
            }
        }
    }

    /// Number of live conversations.
    pub async fn len(&self) -> usize {
        self.workers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Tear down one conversation. Queued utterances are still answered.
    pub async fn close(&self, key: &ConversationKey) -> bool {
        let removed = self.workers.lock().await.remove(key);
        match removed {
            Some(worker) => {
                drop(worker.tx);
                if let Err(e) = worker.handle.await {
                    warn!(conversation = %key, error = %e, "Conversation worker ended abnormally");
                }
                true
            }
            None => false,
        }
    }

    /// Tear down every conversation, letting each finish its queue.
    pub async fn shutdown(&self) {
        let drained: Vec<(ConversationKey, Worker)> = self.workers.lock().await.drain().collect();
        info!(conversations = drained.len(), "Shutting down conversations");
        for (key, worker) in drained {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                warn!(conversation = %key, error = %e, "Conversation worker ended abnormally");
            }
        }
    }

    fn spawn_worker(&self, key: ConversationKey) -> Worker {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let ctx = self.ctx.clone();
        let workers = Arc::clone(&self.workers);
        let mut idle = self.idle_timeout;
        let generation = self.spawned.fetch_add(1, Ordering::Relaxed);

        let handle = tokio::spawn(async move {
            debug!(conversation = %key, "Conversation worker started");
            let mut router = CommandRouter::new(key.clone(), ctx).await;
            loop {
                let next = match idle {
                    None => rx.recv().await,
                    Some(limit) => match tokio::time::timeout(limit, rx.recv()).await {
                        Ok(next) => next,
                        Err(_) => {
                            // Dropping our entry closes the channel; anything
                            // already queued is still answered below.
                            retire(&workers, &key, generation).await;
                            idle = None;
                            continue;
                        }
                    },
                };
                let Some(Job { inbound, reply }) = next else { break };
                let text = router.dispatch(&inbound.text, inbound.attachments).await;
                if reply.send(text).is_err() {
                    debug!(conversation = %key, "Reply receiver dropped");
                }
            }
            router.release().await;
            debug!(conversation = %key, "Conversation worker stopped");
        });
        Worker { tx, handle, generation }
    }
}

async fn retire(workers: &Workers, key: &ConversationKey, generation: u64) {
    let mut workers = workers.lock().await;
    if workers.get(key).is_some_and(|w| w.generation == generation) {
        workers.remove(key);
        info!(conversation = %key, "Conversation idle, retiring it");
    }
}
