//! Reminder scheduler: delayed, cancellable one-shot messages.
//!
//! Each reminder is an independent timer task. When it fires, a
//! [`FiredReminder`] is emitted on the receiver handed out at construction;
//! the caller is responsible for delivering it to the conversation it names.

use chrono::{DateTime, Utc};
use palaver_core::message::ConversationKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A reminder waiting to fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: u64,

    /// Conversation the reminder is delivered to
    pub target: ConversationKey,

    pub task: String,

    pub due_at: DateTime<Utc>,
}

/// A reminder whose delay has elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredReminder {
    pub id: u64,
    pub target: ConversationKey,
    pub task: String,
}

impl FiredReminder {
    /// The text delivered to the user.
    pub fn message(&self) -> String {
        format!("REMINDER: {}", self.task)
    }
}

/// Time units accepted by `remind me`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl ReminderUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim() {
            "s" => Some(Self::Seconds),
            "m" => Some(Self::Minutes),
            "h" => Some(Self::Hours),
            "d" => Some(Self::Days),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }

    fn seconds(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3_600.0,
            Self::Days => 86_400.0,
        }
    }

    /// `amount` of this unit as a duration. Negative, NaN and absurdly large
    /// amounts are rejected.
    pub fn delay(self, amount: f64) -> Option<Duration> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(amount * self.seconds()).ok()
    }
}

struct Pending {
    reminder: Reminder,
    handle: Option<JoinHandle<()>>,
}

/// Owns every pending reminder's timer task.
pub struct ReminderScheduler {
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, Pending>>>,
    fired_tx: mpsc::Sender<FiredReminder>,
}

impl ReminderScheduler {
    /// Create a scheduler and the receiver fired reminders arrive on.
    pub fn new() -> (Self, mpsc::Receiver<FiredReminder>) {
        let (fired_tx, fired_rx) = mpsc::channel(64);
        let scheduler = Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            fired_tx,
        };
        (scheduler, fired_rx)
    }

    /// Schedule `task` for delivery to `target` after `delay`. Returns the
    /// reminder id, which `cancel` accepts.
    pub fn schedule(&self, target: ConversationKey, task: impl Into<String>, delay: Duration) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = task.into();
        let due_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let reminder = Reminder {
            id,
            target: target.clone(),
            task: task.clone(),
            due_at,
        };

        let pending = Arc::clone(&self.pending);
        let tx = self.fired_tx.clone();

        // The map lock is held across the spawn so the timer can never remove
        // its entry before the entry exists.
        let mut map = match self.pending.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let still_pending = match pending.lock() {
                Ok(mut m) => m.remove(&id).is_some(),
                Err(poisoned) => poisoned.into_inner().remove(&id).is_some(),
            };
            if !still_pending {
                return;
            }

            info!(reminder = id, conversation = %target, "Reminder fired");
            if tx.send(FiredReminder { id, target, task }).await.is_err() {
                warn!(reminder = id, "Reminder receiver dropped");
            }
        });
        map.insert(
            id,
            Pending {
                reminder,
                handle: Some(handle),
            },
        );

        debug!(reminder = id, delay_secs = delay.as_secs_f64(), "Reminder scheduled");
        id
    }

    /// Cancel a pending reminder. Returns false if it is unknown or already fired.
    pub fn cancel(&self, id: u64) -> bool {
        let removed = match self.pending.lock() {
            Ok(mut m) => m.remove(&id),
            Err(poisoned) => poisoned.into_inner().remove(&id),
        };
        match removed {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    handle.abort();
                }
                info!(reminder = id, "Reminder cancelled");
                true
            }
            None => false,
        }
    }

    /// Pending reminders, soonest first.
    pub fn pending(&self) -> Vec<Reminder> {
        let mut all: Vec<Reminder> = match self.pending.lock() {
            Ok(m) => m.values().map(|p| p.reminder.clone()).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .values()
                .map(|p| p.reminder.clone())
                .collect(),
        };
        all.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Abort every pending timer.
    pub fn shutdown(&self) {
        let drained: Vec<Pending> = match self.pending.lock() {
            Ok(mut m) => m.drain().map(|(_, p)| p).collect(),
            Err(poisoned) => poisoned.into_inner().drain().map(|(_, p)| p).collect(),
        };
        for entry in drained.into_iter().filter_map(|p| p.handle) {
            entry.abort();
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
