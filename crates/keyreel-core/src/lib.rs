//! keyreel-core - session management for legacy encrypted-media key
//! negotiation.
//!
//! One [`KeySession`] represents one active decryption-key session against
//! a backing decryption module. The session serializes all key-request and
//! key-update operations: callers enqueue work and return synchronously,
//! drains run later as deferred units of work, and results are delivered
//! asynchronously through an ordered event queue.
//!
//! # Module Structure
//!
//! - [`session`]: the `KeySession` entity and its drain algorithms
//! - [`scheduler`]: coalescing one-shot drain scheduling
//! - [`event`]: outbound events and the dispatch queue
//! - [`cdm`]: backing-module traits and operation outcomes
//! - [`client`]: collaborator traits (event target, keys registry)
//! - [`error`]: construction and validation errors, the error-slot value
//! - [`storage`]: storage-directory resolution for persistable sessions
//!
//! # Execution Model
//!
//! Single-threaded and cooperative. The session never blocks and owns all
//! of its mutable state; the owner pumps it with
//! [`KeySession::tick`], each tick performing exactly one unit of work (one
//! whole-queue drain pass, or one event delivery).

pub mod cdm;
pub mod client;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod session;
pub mod storage;

pub use cdm::{Cdm, CdmSession, KeyRequestOutcome, KeyUpdateOutcome};
pub use client::{EventTarget, KeysRegistry};
pub use error::{KeyError, OpenError, SessionError};
pub use event::{EventQueue, SessionEvent};
pub use scheduler::{DeferredTasks, DrainTask};
pub use session::KeySession;
pub use storage::{StorageContext, storage_directory};
