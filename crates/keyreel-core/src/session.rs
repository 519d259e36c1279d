//! Key session - the top-level protocol entity.
//!
//! A `KeySession` represents one active decryption-key session against a
//! backing module. It serializes all key-request and key-update operations:
//! callers enqueue work and return immediately, drains run as deferred
//! units, and results come back through the ordered event queue.
//!
//! # Architecture
//!
//! ```text
//! KeySession
//!   ├─ cdm: Option<C>                  (backing module handle)
//!   ├─ pending_requests: VecDeque      (FIFO, key requests)
//!   ├─ pending_updates: VecDeque       (FIFO, key material)
//!   ├─ tasks: DeferredTasks            (coalescing drain slots)
//!   ├─ events: EventQueue              (FIFO, outbound)
//!   ├─ error: Option<KeyError>         (latest failure only)
//!   ├─ target: Weak<dyn EventTarget>   (delivery, fire-and-forget)
//!   └─ registry: Weak<dyn KeysRegistry>
//! ```
//!
//! # Control Flow
//!
//! 1. A caller issues `generate_key_request` or `update`
//! 2. The item is appended to its queue and a drain is scheduled
//!    (idempotently)
//! 3. A later [`tick`](KeySession::tick) fires the drain, invoking the
//!    backing module once per item
//! 4. Each outcome enqueues zero or one event
//! 5. Later ticks deliver events one at a time, in submission order
//!
//! The model is single-threaded and cooperative: no blocking calls, no
//! timeouts, no external synchronization. Every scheduled drain and queued
//! event eventually fires unless the session is torn down first.

use std::{collections::VecDeque, fmt, mem, path::PathBuf, rc::Weak};

use bytes::Bytes;

use crate::{
    cdm::{Cdm, CdmSession},
    client::{EventTarget, KeysRegistry},
    error::{KeyError, OpenError, SessionError},
    event::{EventQueue, SessionEvent},
    scheduler::{DeferredTasks, DrainTask},
    storage::{StorageContext, storage_directory},
};

/// One queued key request: MIME type plus owned initialization data.
#[derive(Debug, Clone)]
struct PendingKeyRequest {
    mime_type: String,
    init_data: Bytes,
}

/// One queued piece of key material awaiting an update drain.
#[derive(Debug, Clone)]
struct PendingKeyUpdate {
    key: Bytes,
}

/// One active decryption-key session.
///
/// Owns its backing-module handle exclusively. The session is `Open` from
/// construction until [`close`](Self::close), after which it is terminal:
/// request and update calls still enqueue, but no drain will ever consume
/// them because no live handle exists.
///
/// Dropping a session tears it down the same way `close` does.
pub struct KeySession<C: CdmSession> {
    /// Key-system identifier this session was opened for.
    key_system: String,
    /// Live backing handle; `None` once closed.
    cdm: Option<C>,
    /// FIFO pending key requests.
    pending_requests: VecDeque<PendingKeyRequest>,
    /// FIFO pending key updates.
    pending_updates: VecDeque<PendingKeyUpdate>,
    /// Coalescing drain scheduler.
    tasks: DeferredTasks,
    /// Outbound event queue.
    events: EventQueue,
    /// Latest asynchronous failure, overwritten on each new one.
    error: Option<KeyError>,
    /// Event-delivery target; weak so the session never keeps its owner
    /// alive.
    target: Weak<dyn EventTarget>,
    /// Keys registry notified on successful key storage.
    registry: Weak<dyn KeysRegistry>,
}

impl<C: CdmSession> KeySession<C> {
    /// Open a new session against a backing module.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] when the module cannot produce a handle. This
    /// is a fatal construction error, never a queued failure.
    pub fn open<D>(
        cdm: &D,
        key_system: &str,
        target: Weak<dyn EventTarget>,
        registry: Weak<dyn KeysRegistry>,
    ) -> Result<Self, OpenError>
    where
        D: Cdm<Session = C>,
    {
        let handle = cdm.open(key_system)?;

        tracing::debug!(key_system, session_id = handle.session_id(), "key session opened");

        Ok(Self {
            key_system: key_system.to_string(),
            cdm: Some(handle),
            pending_requests: VecDeque::new(),
            pending_updates: VecDeque::new(),
            tasks: DeferredTasks::new(),
            events: EventQueue::new(),
            error: None,
            target,
            registry,
        })
    }

    /// Key-system identifier this session was opened for.
    pub fn key_system(&self) -> &str {
        &self.key_system
    }

    /// Opaque session identifier assigned by the backing module.
    ///
    /// `None` once the session is closed.
    pub fn session_id(&self) -> Option<&str> {
        self.cdm.as_ref().map(CdmSession::session_id)
    }

    /// Look up a cached key by key ID on the live handle.
    ///
    /// `None` once the session is closed or when the module retains no such
    /// key.
    pub fn cached_key_for_key_id(&self, key_id: &str) -> Option<Bytes> {
        self.cdm.as_ref().and_then(|cdm| cdm.cached_key_for_key_id(key_id))
    }

    /// Latest asynchronous failure reported by the backing module.
    pub fn error(&self) -> Option<&KeyError> {
        self.error.as_ref()
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.cdm.is_none()
    }

    /// Whether the session still holds work the owner must not reclaim.
    ///
    /// True while the backing handle is live or any event awaits delivery.
    pub fn has_pending_activity(&self) -> bool {
        self.cdm.is_some() || self.events.has_pending_events()
    }

    /// Number of queued, undrained key requests.
    pub fn pending_request_count(&self) -> usize {
        self.pending_requests.len()
    }

    /// Number of queued, undrained key updates.
    pub fn pending_update_count(&self) -> usize {
        self.pending_updates.len()
    }

    /// Number of events awaiting delivery.
    pub fn queued_event_count(&self) -> usize {
        self.events.pending_count()
    }

    /// Whether a drain is currently scheduled for the given queue.
    pub fn has_scheduled_drain(&self, task: DrainTask) -> bool {
        self.tasks.is_scheduled(task)
    }

    /// Resolve the storage directory for persisted keys in this context.
    ///
    /// `None` when persistence is disabled; see [`crate::storage`].
    pub fn storage_directory(&self, context: &impl StorageContext) -> Option<PathBuf> {
        storage_directory(context)
    }

    /// Queue a key request against the backing module.
    ///
    /// Always succeeds synchronously: the request is appended and a drain
    /// of the request queue is scheduled. No validation happens at call
    /// time; empty `init_data` is deferred to the backing module. Multiple
    /// calls before the drain fires coalesce into one scheduled drain.
    pub fn generate_key_request(&mut self, mime_type: &str, init_data: Bytes) {
        self.pending_requests
            .push_back(PendingKeyRequest { mime_type: mime_type.to_string(), init_data });

        let newly_scheduled = self.tasks.schedule(DrainTask::KeyRequests);

        tracing::debug!(
            mime_type,
            pending = self.pending_requests.len(),
            coalesced = !newly_scheduled,
            "key request queued"
        );
    }

    /// Queue key material for the backing module.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidAccess`] immediately when `key` is
    /// empty; nothing is queued and no drain is scheduled. Any other
    /// failure is reported asynchronously through the event queue.
    pub fn update(&mut self, key: Bytes) -> Result<(), SessionError> {
        if key.is_empty() {
            return Err(SessionError::InvalidAccess);
        }

        self.pending_updates.push_back(PendingKeyUpdate { key });
        self.tasks.schedule(DrainTask::KeyUpdates);

        tracing::debug!(pending = self.pending_updates.len(), "key update queued");

        Ok(())
    }

    /// Tear the session down.
    ///
    /// Releases keys on the backing handle, detaches its client, drops the
    /// handle, and cancels all undelivered events. Idempotent: calling
    /// again is a no-op. Scheduled drains are left in place; with no live
    /// handle they become no-ops that preserve their queues.
    pub fn close(&mut self) {
        if let Some(mut cdm) = self.cdm.take() {
            cdm.release_keys();
            cdm.detach_client();
            tracing::debug!(key_system = %self.key_system, "key session closed");
        }

        let dropped = self.events.cancel_all();
        if dropped > 0 {
            tracing::debug!(dropped, "undelivered events cancelled at teardown");
        }
    }

    /// Run one cooperative tick.
    ///
    /// Performs exactly one pending unit of work: the oldest due drain
    /// slot, or - once no drain is due - delivery of one queued event.
    /// Returns whether anything ran. Drains due at tick time run before
    /// event deliveries; within each queue, order is strictly FIFO.
    pub fn tick(&mut self) -> bool {
        if let Some(task) = self.tasks.take_next() {
            match task {
                DrainTask::KeyRequests => self.drain_key_requests(),
                DrainTask::KeyUpdates => self.drain_key_updates(),
            }
            return true;
        }

        self.dispatch_next_event()
    }

    /// Run ticks until no drain is due and no event awaits delivery.
    pub fn run_until_idle(&mut self) {
        while self.tick() {}
    }

    /// Drain the pending key-request queue.
    ///
    /// Processes the entire queue contents as of fire time; items enqueued
    /// during the pass wait for a newly scheduled drain. Without a live
    /// handle the pass is abandoned and the queue preserved.
    fn drain_key_requests(&mut self) {
        let mut batch = mem::take(&mut self.pending_requests);
        let drained = batch.len();

        while let Some(request) = batch.pop_front() {
            let Some(cdm) = self.cdm.as_mut() else {
                // No live handle: put everything back for a future drain.
                batch.append(&mut self.pending_requests);
                self.pending_requests = batch;
                tracing::debug!(
                    pending = self.pending_requests.len(),
                    "request drain abandoned: no backing handle"
                );
                return;
            };

            let outcome = cdm.generate_key_request(&request.mime_type, &request.init_data);

            if outcome.error_code != 0 {
                self.record_error(outcome.error_code, outcome.system_code);
                continue;
            }

            match outcome.request {
                Some(body) => self.queue_message(body, outcome.destination_url),
                // Neither an error nor request bytes: no event is queued
                // for this item.
                None => tracing::debug!("key request produced no message and no error"),
            }
        }

        tracing::debug!(drained, "request drain complete");
    }

    /// Drain the pending key-update queue.
    ///
    /// The three outcomes of one item (follow-up message, stored key,
    /// error) are independent and may co-occur. A per-item error never
    /// aborts the remainder of the pass.
    fn drain_key_updates(&mut self) {
        let mut batch = mem::take(&mut self.pending_updates);
        let drained = batch.len();

        while let Some(update) = batch.pop_front() {
            let Some(cdm) = self.cdm.as_mut() else {
                batch.append(&mut self.pending_updates);
                self.pending_updates = batch;
                tracing::debug!(
                    pending = self.pending_updates.len(),
                    "update drain abandoned: no backing handle"
                );
                return;
            };

            let outcome = cdm.update(&update.key);

            if let Some(body) = outcome.next_message {
                self.queue_message(body, String::new());
            }

            if outcome.did_store_key {
                self.events.enqueue(SessionEvent::KeyAdded);

                // Registry notification is synchronous with the drain, not
                // deferred with the event.
                if let Some(registry) = self.registry.upgrade() {
                    registry.key_added();
                }
            }

            if outcome.error_code != 0 {
                self.record_error(outcome.error_code, outcome.system_code);
            }
        }

        tracing::debug!(drained, "update drain complete");
    }

    /// Deliver the oldest queued event to the target, if any.
    fn dispatch_next_event(&mut self) -> bool {
        let Some(event) = self.events.take_next() else {
            return false;
        };

        match self.target.upgrade() {
            Some(target) => target.on_session_event(event),
            None => tracing::debug!("event dropped: delivery target is gone"),
        }

        true
    }

    /// Queue a `Message` event.
    fn queue_message(&mut self, body: Bytes, destination_url: String) {
        self.events.enqueue(SessionEvent::Message { body, destination_url });
    }

    /// Overwrite the error slot and queue an `Error` event.
    fn record_error(&mut self, code: u32, system_code: u32) {
        tracing::warn!(code, system_code, "backing module reported a key error");

        self.error = Some(KeyError::new(code, system_code));
        self.events.enqueue(SessionEvent::Error { code, system_code });
    }
}

impl<C: CdmSession> Drop for KeySession<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: CdmSession> fmt::Debug for KeySession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySession")
            .field("key_system", &self.key_system)
            .field("closed", &self.cdm.is_none())
            .field("pending_requests", &self.pending_requests.len())
            .field("pending_updates", &self.pending_updates.len())
            .field("queued_events", &self.events.pending_count())
            .field("error", &self.error)
            .finish()
    }
}
