//! keyreel-harness - test doubles for the keyreel protocol core.
//!
//! Provides a scripted backing module ([`ScriptedCdm`]) with per-call
//! outcome programming and call recording, plus recording collaborators
//! ([`RecordingTarget`], [`CountingRegistry`]) for asserting on delivered
//! events and registry notifications.
//!
//! Tests drive sessions explicitly, tick by tick, making every suspension
//! point of the protocol a deterministic step:
//!
//! ```
//! use bytes::Bytes;
//! use keyreel_core::{KeySession, SessionEvent};
//! use keyreel_harness::{
//!     RecordingTarget, ScriptedCdm, no_keys_registry, weak_event_target,
//! };
//!
//! let cdm = ScriptedCdm::supporting("org.test.keys");
//! let target = RecordingTarget::new();
//!
//! let mut session = KeySession::open(
//!     &cdm,
//!     "org.test.keys",
//!     weak_event_target(&target),
//!     no_keys_registry(),
//! )
//! .unwrap();
//!
//! session.generate_key_request("video/mp4", Bytes::from_static(b"init"));
//! session.run_until_idle();
//!
//! assert!(matches!(target.events()[0], SessionEvent::Message { .. }));
//! ```

pub mod recording;
pub mod scripted;

pub use recording::{
    CountingRegistry, RecordingTarget, no_event_target, no_keys_registry, weak_event_target,
    weak_keys_registry,
};
pub use scripted::{ScriptedCdm, ScriptedSession, SessionProbe, SessionScript};
