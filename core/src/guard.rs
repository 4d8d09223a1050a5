//! Stale-result guard for views fed by asynchronous fetches.
//!
//! A `ViewSlot` holds the latest value shown for one view. Every fetch takes
//! a ticket from the slot before it starts; its result is applied only if
//! that ticket is still the most recent one issued for the slot and the
//! backend variant has not been switched since. Anything else is a
//! superseded or cross-backend result and is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::warn;

use crate::backend::{BackendSelector, FetchTicket};

#[derive(Debug)]
pub struct ViewSlot<T> {
    name: &'static str,
    issued: AtomicU64,
    value: Mutex<Option<T>>,
}

impl<T: Clone> ViewSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            issued: AtomicU64::new(0),
            value: Mutex::new(None),
        }
    }

    /// Issue a ticket for a fetch about to start.
    pub fn begin(&self, selector: &BackendSelector) -> FetchTicket {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        selector.ticket(seq)
    }

    /// Whether no newer fetch has started since `ticket` was issued.
    pub fn is_latest(&self, ticket: &FetchTicket) -> bool {
        ticket.seq == self.issued.load(Ordering::SeqCst)
    }

    /// Store `value` if `ticket` is still current. Returns whether it was
    /// applied.
    pub fn apply(&self, ticket: &FetchTicket, selector: &BackendSelector, value: T) -> bool {
        let mut slot = self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Checked under the lock so two results cannot interleave.
        let latest = self.issued.load(Ordering::SeqCst);
        if ticket.seq != latest {
            warn!(view = self.name, seq = ticket.seq, latest, "discarding superseded result");
            return false;
        }
        if !selector.is_current(ticket) {
            warn!(
                view = self.name,
                backend = %ticket.target.variant,
                generation = ticket.generation,
                "discarding result from previous backend"
            );
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn get(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Mutate the shown value in place, if there is one.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut slot = self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_mut().map(f)
    }

    pub fn clear(&self) {
        *self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
