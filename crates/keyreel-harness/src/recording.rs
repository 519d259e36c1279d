//! Recording collaborators for protocol tests.
//!
//! `RecordingTarget` captures delivered events in order; `CountingRegistry`
//! counts `key_added` notifications. Both are single-threaded (`Rc` plus
//! interior mutability), matching the session's execution model, and both
//! come with helpers producing the weak handles `KeySession::open` takes.

use std::{
    cell::{Cell, RefCell},
    mem,
    rc::{Rc, Weak},
};

use keyreel_core::{EventTarget, KeysRegistry, SessionEvent};

/// An event target that records every delivered event in order.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    events: RefCell<Vec<SessionEvent>>,
}

impl RecordingTarget {
    /// Create a new target behind an `Rc`, ready to be downgraded.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Snapshot of delivered events, in delivery order.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.borrow().clone()
    }

    /// Number of events delivered so far.
    pub fn event_count(&self) -> usize {
        self.events.borrow().len()
    }

    /// Drain the recording, returning delivered events in order.
    pub fn take_events(&self) -> Vec<SessionEvent> {
        mem::take(&mut *self.events.borrow_mut())
    }
}

impl EventTarget for RecordingTarget {
    fn on_session_event(&self, event: SessionEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// A keys registry that counts notifications.
#[derive(Debug, Default)]
pub struct CountingRegistry {
    notifications: Cell<usize>,
}

impl CountingRegistry {
    /// Create a new registry behind an `Rc`, ready to be downgraded.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of `key_added` notifications received.
    pub fn count(&self) -> usize {
        self.notifications.get()
    }
}

impl KeysRegistry for CountingRegistry {
    fn key_added(&self) {
        self.notifications.set(self.notifications.get() + 1);
    }
}

/// Weak event-target handle for a recording target.
pub fn weak_event_target(target: &Rc<RecordingTarget>) -> Weak<dyn EventTarget> {
    let target: Rc<dyn EventTarget> = target.clone();
    Rc::downgrade(&target)
}

/// Weak registry handle for a counting registry.
pub fn weak_keys_registry(registry: &Rc<CountingRegistry>) -> Weak<dyn KeysRegistry> {
    let registry: Rc<dyn KeysRegistry> = registry.clone();
    Rc::downgrade(&registry)
}

/// A weak event-target handle that was never live.
pub fn no_event_target() -> Weak<dyn EventTarget> {
    let weak: Weak<RecordingTarget> = Weak::new();
    weak
}

/// A weak registry handle that was never live.
pub fn no_keys_registry() -> Weak<dyn KeysRegistry> {
    let weak: Weak<CountingRegistry> = Weak::new();
    weak
}
