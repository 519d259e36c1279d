//! Scripted backing module for protocol tests.
//!
//! `ScriptedCdm` hands out sessions whose operation outcomes are
//! pre-programmed per call, in order. Every call is recorded, and a
//! [`SessionProbe`] shares the recording so tests can inspect the handle
//! after it has moved into a `KeySession`.
//!
//! When a script runs out of outcomes the session falls back to echo
//! behavior: key requests return the initialization data as the request
//! body, and updates report a stored key. That keeps order-sensitive tests
//! short - the delivered messages identify their originating calls.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use bytes::Bytes;
use keyreel_core::{Cdm, CdmSession, KeyRequestOutcome, KeyUpdateOutcome, OpenError};

/// Pre-programmed behavior for one scripted session.
#[derive(Debug, Clone, Default)]
pub struct SessionScript {
    session_id: String,
    request_outcomes: VecDeque<KeyRequestOutcome>,
    update_outcomes: VecDeque<KeyUpdateOutcome>,
    cached_keys: HashMap<String, Bytes>,
}

impl SessionScript {
    /// Create an empty script with the given session identifier.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), ..Self::default() }
    }

    /// Append the outcome for the next unscripted key-request call.
    pub fn on_request(mut self, outcome: KeyRequestOutcome) -> Self {
        self.request_outcomes.push_back(outcome);
        self
    }

    /// Append the outcome for the next unscripted key-update call.
    pub fn on_update(mut self, outcome: KeyUpdateOutcome) -> Self {
        self.update_outcomes.push_back(outcome);
        self
    }

    /// Make `cached_key_for_key_id` return `bytes` for `key_id`.
    pub fn with_cached_key(mut self, key_id: impl Into<String>, bytes: Bytes) -> Self {
        self.cached_keys.insert(key_id.into(), bytes);
        self
    }
}

/// Shared recording of everything a scripted session was asked to do.
#[derive(Debug, Default)]
struct Recording {
    request_outcomes: VecDeque<KeyRequestOutcome>,
    update_outcomes: VecDeque<KeyUpdateOutcome>,
    cached_keys: HashMap<String, Bytes>,
    requests_seen: Vec<(String, Bytes)>,
    updates_seen: Vec<Bytes>,
    keys_released: bool,
    client_detached: bool,
}

/// A scripted backing module supporting exactly one key system.
#[derive(Debug, Default)]
pub struct ScriptedCdm {
    key_system: String,
    script: RefCell<Option<SessionScript>>,
    last_session: RefCell<Option<Rc<RefCell<Recording>>>>,
}

impl ScriptedCdm {
    /// A module supporting `key_system`, handing out echo-only sessions.
    pub fn supporting(key_system: impl Into<String>) -> Self {
        Self {
            key_system: key_system.into(),
            script: RefCell::new(None),
            last_session: RefCell::new(None),
        }
    }

    /// A module whose next opened session follows `script`.
    pub fn with_script(key_system: impl Into<String>, script: SessionScript) -> Self {
        Self {
            key_system: key_system.into(),
            script: RefCell::new(Some(script)),
            last_session: RefCell::new(None),
        }
    }

    /// Probe into the most recently opened session, if any.
    pub fn probe(&self) -> Option<SessionProbe> {
        self.last_session.borrow().as_ref().map(|inner| SessionProbe { inner: Rc::clone(inner) })
    }
}

impl Cdm for ScriptedCdm {
    type Session = ScriptedSession;

    fn supports(&self, key_system: &str) -> bool {
        key_system == self.key_system
    }

    fn open(&self, key_system: &str) -> Result<ScriptedSession, OpenError> {
        if !self.supports(key_system) {
            return Err(OpenError::UnsupportedKeySystem(key_system.to_string()));
        }

        let script =
            self.script.borrow_mut().take().unwrap_or_else(|| SessionScript::new("scripted-1"));

        let recording = Rc::new(RefCell::new(Recording {
            request_outcomes: script.request_outcomes,
            update_outcomes: script.update_outcomes,
            cached_keys: script.cached_keys,
            ..Recording::default()
        }));

        *self.last_session.borrow_mut() = Some(Rc::clone(&recording));

        Ok(ScriptedSession { id: script.session_id, inner: recording })
    }
}

/// One scripted session handle.
#[derive(Debug)]
pub struct ScriptedSession {
    id: String,
    inner: Rc<RefCell<Recording>>,
}

impl CdmSession for ScriptedSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn generate_key_request(&mut self, mime_type: &str, init_data: &[u8]) -> KeyRequestOutcome {
        let mut inner = self.inner.borrow_mut();
        inner.requests_seen.push((mime_type.to_string(), Bytes::copy_from_slice(init_data)));

        inner
            .request_outcomes
            .pop_front()
            .unwrap_or_else(|| KeyRequestOutcome::message(Bytes::copy_from_slice(init_data), ""))
    }

    fn update(&mut self, key: &[u8]) -> KeyUpdateOutcome {
        let mut inner = self.inner.borrow_mut();
        inner.updates_seen.push(Bytes::copy_from_slice(key));

        inner.update_outcomes.pop_front().unwrap_or_else(KeyUpdateOutcome::stored)
    }

    fn cached_key_for_key_id(&self, key_id: &str) -> Option<Bytes> {
        self.inner.borrow().cached_keys.get(key_id).cloned()
    }

    fn release_keys(&mut self) {
        self.inner.borrow_mut().keys_released = true;
    }

    fn detach_client(&mut self) {
        self.inner.borrow_mut().client_detached = true;
    }
}

/// Read-only view into a scripted session's recording.
///
/// Remains valid after the session handle moves into a `KeySession` or is
/// dropped at teardown.
#[derive(Debug)]
pub struct SessionProbe {
    inner: Rc<RefCell<Recording>>,
}

impl SessionProbe {
    /// Every `(mime_type, init_data)` pair passed to the session, in call
    /// order.
    pub fn requests_seen(&self) -> Vec<(String, Bytes)> {
        self.inner.borrow().requests_seen.clone()
    }

    /// Every piece of key material passed to the session, in call order.
    pub fn updates_seen(&self) -> Vec<Bytes> {
        self.inner.borrow().updates_seen.clone()
    }

    /// Number of key-request calls the session received.
    pub fn request_count(&self) -> usize {
        self.inner.borrow().requests_seen.len()
    }

    /// Number of key-update calls the session received.
    pub fn update_count(&self) -> usize {
        self.inner.borrow().updates_seen.len()
    }

    /// Whether `release_keys` was called.
    pub fn keys_released(&self) -> bool {
        self.inner.borrow().keys_released
    }

    /// Whether `detach_client` was called.
    pub fn client_detached(&self) -> bool {
        self.inner.borrow().client_detached
    }
}
