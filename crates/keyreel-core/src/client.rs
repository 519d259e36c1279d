//! Collaborator traits consumed by a key session.
//!
//! Both collaborators are held weakly (`std::rc::Weak`): the session must
//! never keep its owner alive, since ownership of the session belongs to
//! its creator. A collaborator that has been dropped simply stops being
//! notified; the session carries on.

use crate::event::SessionEvent;

/// Receives each dispatched [`SessionEvent`] for onward propagation.
///
/// Delivery is fire-and-forget from the session's perspective: the target
/// may not report failure back, and a dead target drops the event silently.
pub trait EventTarget {
    /// Handle one delivered event.
    fn on_session_event(&self, event: SessionEvent);
}

/// The keys registry notified whenever the backing module stores a key.
///
/// Notification happens synchronously during the update drain, alongside
/// the queued `KeyAdded` event.
pub trait KeysRegistry {
    /// A usable key was stored by the backing module.
    fn key_added(&self);
}
