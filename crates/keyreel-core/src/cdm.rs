//! Backing decryption module adapter.
//!
//! The backing module (CDM) is a cryptographic black box: it generates key
//! requests and validates key material, and keyreel never looks inside.
//! This module defines the two traits a backing module implements and the
//! plain-data outcome structs its operations return.
//!
//! Outcomes carry a parallel success/error reporting path: a non-zero
//! `error_code` plus an optional `system_code` detail, alongside whatever
//! payload the operation produced. The session treats these as data and
//! turns them into queued events; they are never raised as Rust errors.
//!
//! All operations are synchronous, non-blocking calls from the session's
//! point of view. Real I/O or hardware negotiation inside an implementation
//! is outside this core's concern.

use bytes::Bytes;

use crate::error::OpenError;

/// A backing decryption module capable of opening key sessions.
pub trait Cdm {
    /// The per-session handle type this module produces.
    type Session: CdmSession;

    /// Whether this module supports the given key-system identifier.
    fn supports(&self, key_system: &str) -> bool;

    /// Open a new session against this module.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] when no handle can be produced. This is the
    /// only fatal failure in the protocol; everything after construction is
    /// reported asynchronously.
    fn open(&self, key_system: &str) -> Result<Self::Session, OpenError>;
}

/// One live backing-module session handle.
///
/// The key session owns its handle exclusively and serializes all calls to
/// it; implementations never need internal synchronization for keyreel's
/// benefit.
pub trait CdmSession {
    /// Opaque session identifier assigned by the backing module.
    fn session_id(&self) -> &str;

    /// Generate a key request for the given initialization data.
    ///
    /// Empty `init_data` is permitted; deciding what to do with it is the
    /// module's business.
    fn generate_key_request(&mut self, mime_type: &str, init_data: &[u8]) -> KeyRequestOutcome;

    /// Handle key material delivered by the application.
    fn update(&mut self, key: &[u8]) -> KeyUpdateOutcome;

    /// Look up a cached key by key ID, if the module retains one.
    fn cached_key_for_key_id(&self, key_id: &str) -> Option<Bytes>;

    /// Release all keys held by this session.
    fn release_keys(&mut self);

    /// Detach the session's client; no further callbacks may be issued.
    fn detach_client(&mut self);
}

/// Result of a single `generate_key_request` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequestOutcome {
    /// Key-request bytes to forward to the license service, if any.
    pub request: Option<Bytes>,
    /// Where the application should deliver the request; may be empty.
    pub destination_url: String,
    /// Non-zero when the request could not be generated.
    pub error_code: u32,
    /// Key-system-specific detail code, 0 when not provided.
    pub system_code: u32,
}

impl KeyRequestOutcome {
    /// A successfully generated request.
    pub fn message(request: Bytes, destination_url: impl Into<String>) -> Self {
        Self {
            request: Some(request),
            destination_url: destination_url.into(),
            error_code: 0,
            system_code: 0,
        }
    }

    /// A failed request with an error code pair.
    pub fn failure(error_code: u32, system_code: u32) -> Self {
        Self { request: None, destination_url: String::new(), error_code, system_code }
    }

    /// No error and no request bytes.
    ///
    /// The session queues nothing for this outcome; see the request drain
    /// in [`crate::session`].
    pub fn silent() -> Self {
        Self { request: None, destination_url: String::new(), error_code: 0, system_code: 0 }
    }
}

/// Result of a single `update` call.
///
/// The three observable outcomes (a follow-up message, a stored key, an
/// error) are independent and may co-occur for one piece of key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUpdateOutcome {
    /// Whether the module stored a usable key.
    pub did_store_key: bool,
    /// A follow-up message for the license service, if any.
    pub next_message: Option<Bytes>,
    /// Non-zero when handling the key material failed.
    pub error_code: u32,
    /// Key-system-specific detail code, 0 when not provided.
    pub system_code: u32,
}

impl KeyUpdateOutcome {
    /// Key material was stored; nothing else to report.
    pub fn stored() -> Self {
        Self { did_store_key: true, next_message: None, error_code: 0, system_code: 0 }
    }

    /// Key material was consumed without storing a key.
    pub fn ignored() -> Self {
        Self { did_store_key: false, next_message: None, error_code: 0, system_code: 0 }
    }

    /// Handling failed with an error code pair.
    pub fn failure(error_code: u32, system_code: u32) -> Self {
        Self { did_store_key: false, next_message: None, error_code, system_code }
    }

    /// Attach a follow-up message to this outcome.
    pub fn with_next_message(mut self, body: Bytes) -> Self {
        self.next_message = Some(body);
        self
    }

    /// Attach an error code pair to this outcome.
    pub fn with_error(mut self, error_code: u32, system_code: u32) -> Self {
        self.error_code = error_code;
        self.system_code = system_code;
        self
    }
}
