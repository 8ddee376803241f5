//! Single-slot transient notifications.
//!
//! At most one notification is visible. Showing a new one while another is
//! visible hides the current one first and presents the new one after a
//! short reopen delay, so the renderer sees a distinct close/open cycle.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::config::NotificationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    #[default]
    Info,
    Warning,
    Error,
}

impl Severity {
    /// How long the renderer keeps a notification of this severity on screen.
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Success => 2000,
            Self::Info => 3000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub seq: u64,
    pub message: String,
    pub severity: Severity,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTransition {
    /// Visible immediately.
    Presented { seq: u64 },
    /// Slot cleared; call `reopen_due(seq)` after `delay_ms`.
    Reopening { seq: u64, delay_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct NotificationSlot {
    visible: Option<Notification>,
    queued: Option<Notification>,
    next_seq: u64,
    reopen_delay_ms: u64,
}

impl NotificationSlot {
    #[must_use]
    pub fn new(reopen_delay_ms: u64) -> Self {
        Self {
            visible: None,
            queued: None,
            next_seq: 0,
            reopen_delay_ms,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, severity: Severity) -> SlotTransition {
        let seq = self.next_seq;
        self.next_seq += 1;
        let notification = Notification {
            seq,
            message: message.into(),
            severity,
            duration_ms: severity.default_duration_ms(),
        };

        let busy = self.visible.take().is_some() || self.queued.is_some();
        if busy {
            // Latest wins: an older queued notification is dropped.
            self.queued = Some(notification);
            SlotTransition::Reopening {
                seq,
                delay_ms: self.reopen_delay_ms,
            }
        } else {
            self.visible = Some(notification);
            SlotTransition::Presented { seq }
        }
    }

    /// Presents the queued notification if `seq` is still the latest one.
    pub fn reopen_due(&mut self, seq: u64) -> Option<&Notification> {
        if self.queued.as_ref().map(|n| n.seq) != Some(seq) {
            debug!(seq, "superseded reopen ignored");
            return None;
        }
        self.visible = self.queued.take();
        self.visible.as_ref()
    }

    /// Hides `seq` if it is the visible notification.
    pub fn dismiss(&mut self, seq: u64) -> bool {
        if self.visible.as_ref().map(|n| n.seq) == Some(seq) {
            self.visible = None;
            true
        } else {
            false
        }
    }

    /// Clears the slot and applies a new reopen delay. Sequence numbers keep
    /// counting so a reopen scheduled earlier cannot match a later show.
    pub fn reconfigure(&mut self, reopen_delay_ms: u64) {
        self.visible = None;
        self.queued = None;
        self.reopen_delay_ms = reopen_delay_ms;
    }

    pub fn current(&self) -> Option<&Notification> {
        self.visible.as_ref()
    }

    pub fn is_reopening(&self) -> bool {
        self.queued.is_some()
    }

    pub const fn reopen_delay_ms(&self) -> u64 {
        self.reopen_delay_ms
    }
}

/// Async notification slot for hosts driving controllers directly.
/// Renderers subscribe to the visible notification.
pub struct NotificationChannel {
    slot: Mutex<NotificationSlot>,
    tx: watch::Sender<Option<Notification>>,
}

impl NotificationChannel {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            slot: Mutex::new(NotificationSlot::new(config.reopen_delay_ms)),
            tx,
        }
    }

    fn slot(&self) -> MutexGuard<'_, NotificationSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, slot: &NotificationSlot) {
        self.tx.send_replace(slot.current().cloned());
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<Notification> {
        self.slot().current().cloned()
    }

    /// Shows a notification, waiting out the reopen delay when the slot was busy.
    /// Returns the sequence number assigned to it.
    pub async fn show(&self, message: impl Into<String>, severity: Severity) -> u64 {
        let transition = {
            let mut slot = self.slot();
            let transition = slot.show(message, severity);
            self.publish(&slot);
            transition
        };

        match transition {
            SlotTransition::Presented { seq } => seq,
            SlotTransition::Reopening { seq, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                let mut slot = self.slot();
                if slot.reopen_due(seq).is_some() {
                    self.publish(&slot);
                }
                seq
            }
        }
    }

    pub fn dismiss(&self, seq: u64) -> bool {
        let mut slot = self.slot();
        let dismissed = slot.dismiss(seq);
        if dismissed {
            self.publish(&slot);
        }
        dismissed
    }
}
