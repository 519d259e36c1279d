//! Fuzz target for the key session state machine
//!
//! Drives a session through arbitrary operation sequences with arbitrary
//! backing-module outcomes.
//!
//! # Strategy
//!
//! - Mixed operations: requests, updates, ticks, idle pumps, teardown
//! - Arbitrary payloads: empty and non-empty init data and key material
//! - Arbitrary outcomes: messages, silent results, errors, co-occurring
//!   update results
//!
//! # Invariants
//!
//! - The session NEVER panics, whatever the interleaving
//! - Empty key material always fails synchronously and queues nothing
//! - Every delivered KeyAdded event has a registry notification
//! - Without a teardown, registry notifications equal delivered KeyAdded
//!   events once the session is idle
//! - Pumping to idle always leaves the event queue empty

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use keyreel_core::{KeyRequestOutcome, KeySession, KeyUpdateOutcome, SessionEvent};
use keyreel_harness::{
    CountingRegistry, RecordingTarget, ScriptedCdm, SessionScript, weak_event_target,
    weak_keys_registry,
};
use libfuzzer_sys::fuzz_target;

const KEY_SYSTEM: &str = "org.fuzz.keys";

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    GenerateRequest { init_data: Vec<u8>, outcome: RequestScript },
    Update { key: Vec<u8>, outcome: UpdateScript },
    Tick,
    RunUntilIdle,
    Close,
}

#[derive(Debug, Clone, Arbitrary)]
enum RequestScript {
    Message { body: Vec<u8> },
    Failure { code: u8, system_code: u8 },
    Silent,
}

impl RequestScript {
    fn into_outcome(self) -> KeyRequestOutcome {
        match self {
            Self::Message { body } => {
                KeyRequestOutcome::message(Bytes::from(body), "https://fuzz.example")
            },
            Self::Failure { code, system_code } => {
                // Error codes are non-zero by contract.
                KeyRequestOutcome::failure(u32::from(code) + 1, u32::from(system_code))
            },
            Self::Silent => KeyRequestOutcome::silent(),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct UpdateScript {
    stored: bool,
    next_message: Option<Vec<u8>>,
    error: Option<(u8, u8)>,
}

impl UpdateScript {
    fn into_outcome(self) -> KeyUpdateOutcome {
        let mut outcome =
            if self.stored { KeyUpdateOutcome::stored() } else { KeyUpdateOutcome::ignored() };
        if let Some(body) = self.next_message {
            outcome = outcome.with_next_message(Bytes::from(body));
        }
        if let Some((code, system_code)) = self.error {
            outcome = outcome.with_error(u32::from(code) + 1, u32::from(system_code));
        }
        outcome
    }
}

fuzz_target!(|ops: Vec<SessionOp>| {
    // Outcomes are consumed in call order, so collect them up front in the
    // order the drains will ask for them.
    let mut script = SessionScript::new("fuzz-1");
    for op in &ops {
        match op {
            SessionOp::GenerateRequest { outcome, .. } => {
                script = script.on_request(outcome.clone().into_outcome());
            },
            SessionOp::Update { key, outcome } if !key.is_empty() => {
                script = script.on_update(outcome.clone().into_outcome());
            },
            _ => {},
        }
    }

    let cdm = ScriptedCdm::with_script(KEY_SYSTEM, script);
    let target = RecordingTarget::new();
    let registry = CountingRegistry::new();

    let Ok(mut session) = KeySession::open(
        &cdm,
        KEY_SYSTEM,
        weak_event_target(&target),
        weak_keys_registry(&registry),
    ) else {
        return;
    };

    let mut closed = false;

    for op in ops {
        match op {
            SessionOp::GenerateRequest { init_data, .. } => {
                session.generate_key_request("video/mp4", Bytes::from(init_data));
            },
            SessionOp::Update { key, .. } => {
                let was_empty = key.is_empty();
                let result = session.update(Bytes::from(key));
                assert_eq!(result.is_err(), was_empty);
            },
            SessionOp::Tick => {
                session.tick();
            },
            SessionOp::RunUntilIdle => {
                session.run_until_idle();
            },
            SessionOp::Close => {
                session.close();
                closed = true;
                assert!(!session.has_pending_activity());
            },
        }
    }

    session.run_until_idle();
    assert_eq!(session.queued_event_count(), 0);

    let delivered_key_added = target
        .events()
        .iter()
        .filter(|event| matches!(event, SessionEvent::KeyAdded))
        .count();

    // A teardown can drop queued KeyAdded events after the registry was
    // already notified, so delivery only bounds the count from below.
    assert!(delivered_key_added <= registry.count());
    if !closed {
        assert_eq!(delivered_key_added, registry.count());
    }

    if let Some(error) = session.error() {
        assert_ne!(error.code, 0);
    }
});
