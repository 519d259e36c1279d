//! Outbound session events and their dispatch queue.
//!
//! Every observable protocol result travels through [`EventQueue`]: drains
//! enqueue events, and later cooperative ticks deliver them one at a time,
//! in submission order, to the session's delivery target. Teardown cancels
//! all undelivered events; they are dropped, never delivered, never
//! re-queued.

use std::collections::VecDeque;

use bytes::Bytes;

/// One outbound notification from a key session.
///
/// Produced only during drains. Ownership moves into the dispatch queue and
/// out again exactly once at delivery, unless teardown discards the event
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A key request or follow-up message for the license service.
    Message {
        /// Opaque message bytes produced by the backing module.
        body: Bytes,
        /// Where the application should deliver the message; empty for
        /// follow-up messages produced by a key update.
        destination_url: String,
    },

    /// The backing module stored a usable key.
    KeyAdded,

    /// The backing module reported a failure.
    Error {
        /// Key-error code (non-zero).
        code: u32,
        /// Key-system-specific detail code, 0 when not provided.
        system_code: u32,
    },
}

/// FIFO buffer of events awaiting asynchronous delivery.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    queue: VecDeque<SessionEvent>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event for later delivery.
    pub fn enqueue(&mut self, event: SessionEvent) {
        self.queue.push_back(event);
    }

    /// Remove and return the oldest undelivered event.
    pub fn take_next(&mut self) -> Option<SessionEvent> {
        self.queue.pop_front()
    }

    /// Drop all undelivered events, returning how many were discarded.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Whether any event awaits delivery.
    pub fn has_pending_events(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Number of events awaiting delivery.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}
