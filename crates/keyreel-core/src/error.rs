//! Error types for the keyreel protocol core.
//!
//! Two error classes exist: synchronous validation errors returned directly
//! to the caller ([`SessionError`]), and asynchronous protocol errors
//! reported by the backing module during a drain. The latter are never
//! thrown: they travel as plain `(code, system_code)` data in a
//! [`KeyError`] slot and an `Error` event, keeping the success and failure
//! reporting paths parallel.

use thiserror::Error;

/// Fatal errors raised while opening a key session.
///
/// Opening fails only when the backing module cannot produce a session
/// handle. Everything after construction is reported asynchronously.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// The backing module does not support the requested key system.
    #[error("unsupported key system: {0}")]
    UnsupportedKeySystem(String),

    /// The backing module failed to produce a session handle.
    #[error("backing module failed to open a session: {0}")]
    Cdm(String),
}

/// Synchronous validation errors returned by session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Key material passed to `update` was empty.
    ///
    /// This is the only call-time validation the protocol performs; all
    /// other failures surface through the event queue.
    #[error("invalid access: key material must not be empty")]
    InvalidAccess,
}

/// The most recent asynchronous failure reported by the backing module.
///
/// A single overwritten slot: no history is kept, and the value never
/// drives control flow. Both codes are opaque integers supplied by the
/// backing module; `system_code` is 0 when not provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyError {
    /// Key-error code (non-zero).
    pub code: u32,
    /// Key-system-specific detail code, 0 when not provided.
    pub system_code: u32,
}

impl KeyError {
    /// An unspecified failure.
    pub const UNKNOWN: u32 = 1;
    /// A failure in the client environment.
    pub const CLIENT: u32 = 2;
    /// A failure talking to the license service.
    pub const SERVICE: u32 = 3;
    /// An output-protection failure.
    pub const OUTPUT: u32 = 4;
    /// Output hardware changed under an active session.
    pub const HARDWARE_CHANGE: u32 = 5;
    /// A key-system domain failure.
    pub const DOMAIN: u32 = 6;

    /// Create an error value from a code pair.
    pub fn new(code: u32, system_code: u32) -> Self {
        Self { code, system_code }
    }

    /// Create an error value with no system-specific detail.
    pub fn from_code(code: u32) -> Self {
        Self { code, system_code: 0 }
    }
}
