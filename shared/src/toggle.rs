//! Optimistic bookmark toggling.
//!
//! The local flag flips as soon as a toggle begins and is restored to its
//! previous value if the remote mutation fails. While a mutation is in
//! flight further toggles of the same item are ignored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, instrument, warn};

use crate::notify::{NotificationChannel, Severity};
use crate::{AppError, RemoteError, BOOKMARK_CHANGED_MESSAGE, MEMBERS_ONLY_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleState {
    pub flagged: bool,
    pub pending: bool,
}

/// Proof of one in-flight mutation; settles exactly that mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleTicket<Id> {
    pub id: Id,
    previous: bool,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Confirmed { flagged: bool },
    RolledBack { flagged: bool, error: RemoteError },
    /// The item was forgotten or the ticket was superseded.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    flagged: bool,
    in_flight: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ToggleBook<Id> {
    entries: HashMap<Id, Entry>,
    next_seq: u64,
}

impl<Id> Default for ToggleBook<Id> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<Id: Clone + Eq + Hash> ToggleBook<Id> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an item when it is first rendered. Known items keep their state.
    pub fn observe(&mut self, id: Id, flagged: bool) {
        self.entries.entry(id).or_insert(Entry {
            flagged,
            in_flight: None,
        });
    }

    pub fn state(&self, id: &Id) -> Option<ToggleState> {
        self.entries.get(id).map(|e| ToggleState {
            flagged: e.flagged,
            pending: e.in_flight.is_some(),
        })
    }

    pub fn flagged(&self, id: &Id) -> Option<bool> {
        self.entries.get(id).map(|e| e.flagged)
    }

    pub fn is_pending(&self, id: &Id) -> bool {
        self.entries.get(id).is_some_and(|e| e.in_flight.is_some())
    }

    /// Flips the flag and marks the item pending. `None` for unknown or pending items.
    pub fn begin(&mut self, id: &Id) -> Option<ToggleTicket<Id>> {
        let entry = self.entries.get_mut(id)?;
        if entry.in_flight.is_some() {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;

        let previous = entry.flagged;
        entry.flagged = !previous;
        entry.in_flight = Some(seq);

        Some(ToggleTicket {
            id: id.clone(),
            previous,
            seq,
        })
    }

    pub fn settle(&mut self, ticket: &ToggleTicket<Id>, result: Result<(), RemoteError>) -> ToggleOutcome {
        let Some(entry) = self.entry_for(ticket) else {
            return ToggleOutcome::Stale;
        };
        entry.in_flight = None;

        match result {
            Ok(()) => ToggleOutcome::Confirmed {
                flagged: entry.flagged,
            },
            Err(error) => {
                entry.flagged = ticket.previous;
                ToggleOutcome::RolledBack {
                    flagged: entry.flagged,
                    error,
                }
            }
        }
    }

    /// Restores the pre-toggle value of a mutation whose outcome will never arrive.
    pub fn abandon(&mut self, ticket: &ToggleTicket<Id>) {
        if let Some(entry) = self.entry_for(ticket) {
            entry.in_flight = None;
            entry.flagged = ticket.previous;
        }
    }

    pub fn pending_ticket(&self, id: &Id) -> Option<ToggleTicket<Id>> {
        let entry = self.entries.get(id)?;
        entry.in_flight.map(|seq| ToggleTicket {
            id: id.clone(),
            previous: !entry.flagged,
            seq,
        })
    }

    pub fn forget(&mut self, id: &Id) {
        self.entries.remove(id);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Id, ToggleState) -> bool) {
        self.entries.retain(|id, e| {
            keep(
                id,
                ToggleState {
                    flagged: e.flagged,
                    pending: e.in_flight.is_some(),
                },
            )
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn entry_for(&mut self, ticket: &ToggleTicket<Id>) -> Option<&mut Entry> {
        self.entries
            .get_mut(&ticket.id)
            .filter(|e| e.in_flight == Some(ticket.seq))
    }
}

/// Remote toggle mutation.
#[async_trait]
pub trait ToggleService<Id>: Send + Sync {
    async fn toggle_flag(&self, id: &Id) -> Result<(), RemoteError>;
}

/// Reports whether the current user may toggle.
pub trait AuthStatus: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

impl AuthStatus for AtomicBool {
    fn is_authenticated(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleStatus {
    Confirmed { flagged: bool },
    RolledBack { flagged: bool, error: RemoteError },
    /// A mutation for this item is already in flight.
    Pending,
    /// The item was never observed or was forgotten meanwhile.
    Untracked,
    Unauthenticated,
}

pub struct OptimisticToggleController<Id, S, A> {
    service: Arc<S>,
    auth: Arc<A>,
    book: Mutex<ToggleBook<Id>>,
    notifications: Arc<NotificationChannel>,
    confirmation: Severity,
}

impl<Id, S, A> OptimisticToggleController<Id, S, A>
where
    Id: Clone + Eq + Hash + std::fmt::Debug + Send + Sync,
    S: ToggleService<Id>,
    A: AuthStatus,
{
    pub fn new(service: Arc<S>, auth: Arc<A>, notifications: Arc<NotificationChannel>) -> Self {
        Self {
            service,
            auth,
            book: Mutex::new(ToggleBook::new()),
            notifications,
            confirmation: Severity::Info,
        }
    }

    /// Severity of the confirmation shown after a successful toggle.
    #[must_use]
    pub fn with_confirmation(mut self, severity: Severity) -> Self {
        self.confirmation = severity;
        self
    }

    fn book(&self) -> MutexGuard<'_, ToggleBook<Id>> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn observe(&self, id: Id, flagged: bool) {
        self.book().observe(id, flagged);
    }

    pub fn forget(&self, id: &Id) {
        self.book().forget(id);
    }

    pub fn state(&self, id: &Id) -> Option<ToggleState> {
        self.book().state(id)
    }

    /// Entry point for the toggle control: checks authentication first.
    #[instrument(skip(self))]
    pub async fn request_toggle(&self, id: Id) -> ToggleStatus {
        if !self.auth.is_authenticated() {
            debug!("toggle refused for anonymous user");
            self.notifications.show(MEMBERS_ONLY_MESSAGE, Severity::Warning).await;
            return ToggleStatus::Unauthenticated;
        }
        self.toggle(id).await
    }

    #[instrument(skip(self))]
    pub async fn toggle(&self, id: Id) -> ToggleStatus {
        let ticket = {
            let mut book = self.book();
            match book.begin(&id) {
                Some(ticket) => ticket,
                None if book.is_pending(&id) => {
                    debug!("toggle ignored while pending");
                    return ToggleStatus::Pending;
                }
                None => return ToggleStatus::Untracked,
            }
        };

        let mut guard = PendingToggle {
            book: &self.book,
            ticket: Some(ticket.clone()),
        };
        let result = self.service.toggle_flag(&id).await;
        guard.ticket = None;

        let outcome = self.book().settle(&ticket, result);
        match outcome {
            ToggleOutcome::Confirmed { flagged } => {
                self.notifications.show(BOOKMARK_CHANGED_MESSAGE, self.confirmation).await;
                ToggleStatus::Confirmed { flagged }
            }
            ToggleOutcome::RolledBack { flagged, error } => {
                warn!(error = %error, "toggle failed; flag restored");
                let message = AppError::from(error.clone()).user_facing_message();
                self.notifications.show(message, Severity::Error).await;
                ToggleStatus::RolledBack { flagged, error }
            }
            ToggleOutcome::Stale => ToggleStatus::Untracked,
        }
    }
}

/// Rolls the flag back if a `toggle` future is dropped mid-mutation.
struct PendingToggle<'a, Id: Clone + Eq + Hash> {
    book: &'a Mutex<ToggleBook<Id>>,
    ticket: Option<ToggleTicket<Id>>,
}

impl<Id: Clone + Eq + Hash> Drop for PendingToggle<'_, Id> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.book
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .abandon(&ticket);
        }
    }
}
