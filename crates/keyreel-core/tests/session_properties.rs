//! Property-based tests for the key session.

use bytes::Bytes;
use keyreel_core::{KeyError, KeySession, KeyUpdateOutcome, SessionEvent};
use keyreel_harness::{
    CountingRegistry, RecordingTarget, ScriptedCdm, SessionScript, weak_event_target,
    weak_keys_registry,
};
use proptest::prelude::*;

const KEY_SYSTEM: &str = "org.test.keys";

/// Property: requests issued before the drain fires are processed in
/// submission order, in a single pass.
#[test]
fn prop_requests_drain_in_submission_order() {
    proptest!(|(payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 1..12))| {
        let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
        let target = RecordingTarget::new();
        let registry = CountingRegistry::new();
        let mut session = KeySession::open(
            &cdm,
            KEY_SYSTEM,
            weak_event_target(&target),
            weak_keys_registry(&registry),
        )?;

        for payload in &payloads {
            session.generate_key_request("video/mp4", Bytes::copy_from_slice(payload));
        }

        // The first tick is the whole drain pass.
        prop_assert!(session.tick());
        let probe = cdm.probe().expect("a session was opened");
        prop_assert_eq!(probe.request_count(), payloads.len());
        prop_assert_eq!(session.pending_request_count(), 0);

        session.run_until_idle();

        // The scripted module echoes init data, so delivered bodies identify
        // their originating calls.
        let delivered: Vec<Bytes> = target
            .events()
            .into_iter()
            .map(|event| match event {
                SessionEvent::Message { body, .. } => body,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        let expected: Vec<Bytes> =
            payloads.iter().map(|payload| Bytes::copy_from_slice(payload)).collect();
        prop_assert_eq!(delivered, expected);
    });
}

/// Property: a `KeyAdded` event is emitted if and only if the module stored
/// a key, and every such event comes with exactly one registry
/// notification.
#[test]
fn prop_key_added_matches_registry_notifications() {
    proptest!(|(outcomes in prop::collection::vec((any::<bool>(), 0u32..4), 1..12))| {
        let mut script = SessionScript::new("s1");
        for (stored, error_code) in &outcomes {
            let outcome = if *stored {
                KeyUpdateOutcome::stored()
            } else {
                KeyUpdateOutcome::ignored()
            };
            script = script.on_update(outcome.with_error(*error_code, 0));
        }

        let cdm = ScriptedCdm::with_script(KEY_SYSTEM, script);
        let target = RecordingTarget::new();
        let registry = CountingRegistry::new();
        let mut session = KeySession::open(
            &cdm,
            KEY_SYSTEM,
            weak_event_target(&target),
            weak_keys_registry(&registry),
        )?;

        for _ in &outcomes {
            session.update(Bytes::from_static(b"key"))?;
        }
        session.run_until_idle();

        let key_added_count = target
            .events()
            .iter()
            .filter(|event| matches!(event, SessionEvent::KeyAdded))
            .count();
        let stored_count = outcomes.iter().filter(|(stored, _)| *stored).count();

        prop_assert_eq!(key_added_count, stored_count);
        prop_assert_eq!(registry.count(), stored_count);

        // The error slot holds only the most recent failure.
        let last_error = outcomes
            .iter()
            .filter(|(_, code)| *code != 0)
            .next_back()
            .map(|(_, code)| KeyError::new(*code, 0));
        prop_assert_eq!(session.error().copied(), last_error);
    });
}

/// Property: scheduling is coalescing - any number of calls before the
/// drain fires produces exactly one pass, and the pass consumes the whole
/// queue.
#[test]
fn prop_coalesced_calls_share_one_drain() {
    proptest!(|(request_count in 1usize..20)| {
        let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
        let target = RecordingTarget::new();
        let registry = CountingRegistry::new();
        let mut session = KeySession::open(
            &cdm,
            KEY_SYSTEM,
            weak_event_target(&target),
            weak_keys_registry(&registry),
        )?;

        for index in 0..request_count {
            session.generate_key_request("video/mp4", Bytes::from(vec![index as u8]));
        }

        prop_assert!(session.tick());
        let probe = cdm.probe().expect("a session was opened");
        prop_assert_eq!(probe.request_count(), request_count);

        // Nothing left to drain: the next tick is an event delivery.
        prop_assert_eq!(session.pending_request_count(), 0);
        prop_assert!(session.tick());
        prop_assert_eq!(target.event_count(), 1);
    });
}
