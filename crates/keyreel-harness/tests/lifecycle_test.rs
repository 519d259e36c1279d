//! Session lifecycle and liveness tests.

use std::path::PathBuf;

use bytes::Bytes;
use keyreel_core::{KeySession, OpenError, SessionError, StorageContext};
use keyreel_harness::{
    CountingRegistry, RecordingTarget, ScriptedCdm, ScriptedSession, SessionScript,
    no_event_target, no_keys_registry, weak_event_target, weak_keys_registry,
};

const KEY_SYSTEM: &str = "org.test.keys";

fn open_session(cdm: &ScriptedCdm) -> KeySession<ScriptedSession> {
    KeySession::open(cdm, KEY_SYSTEM, no_event_target(), no_keys_registry()).unwrap()
}

#[test]
fn open_fails_for_unsupported_key_system() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);

    let result = KeySession::open(&cdm, "com.other.drm", no_event_target(), no_keys_registry());

    assert_eq!(result.err(), Some(OpenError::UnsupportedKeySystem("com.other.drm".to_string())));
}

#[test]
fn close_releases_keys_and_detaches_the_client() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
    let mut session = open_session(&cdm);
    let probe = cdm.probe().unwrap();

    assert!(!probe.keys_released());
    session.close();

    assert!(probe.keys_released());
    assert!(probe.client_detached());
    assert!(session.is_closed());
}

#[test]
fn dropping_a_session_tears_it_down() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
    let session = open_session(&cdm);
    let probe = cdm.probe().unwrap();

    drop(session);

    assert!(probe.keys_released());
    assert!(probe.client_detached());
}

#[test]
fn post_close_requests_enqueue_but_never_reach_the_module() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
    let mut session = open_session(&cdm);
    let probe = cdm.probe().unwrap();

    session.close();
    session.generate_key_request("video/mp4", Bytes::from_static(b"late"));
    session.run_until_idle();

    assert_eq!(probe.request_count(), 0);
    assert_eq!(session.pending_request_count(), 1);
}

#[test]
fn post_close_update_validation_still_applies() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
    let mut session = open_session(&cdm);
    let probe = cdm.probe().unwrap();

    session.close();

    assert_eq!(session.update(Bytes::new()), Err(SessionError::InvalidAccess));
    assert_eq!(session.update(Bytes::from_static(b"key")), Ok(()));

    session.run_until_idle();
    assert_eq!(probe.update_count(), 0);
    assert_eq!(session.pending_update_count(), 1);
}

#[test]
fn a_dead_target_drops_events_silently() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
    let target = RecordingTarget::new();
    let registry = CountingRegistry::new();
    let mut session = KeySession::open(
        &cdm,
        KEY_SYSTEM,
        weak_event_target(&target),
        weak_keys_registry(&registry),
    )
    .unwrap();

    drop(target);

    session.generate_key_request("video/mp4", Bytes::from_static(b"init"));
    session.run_until_idle();

    // The module was consulted and the event queue fully drained; delivery
    // went nowhere.
    assert_eq!(cdm.probe().unwrap().request_count(), 1);
    assert_eq!(session.queued_event_count(), 0);
}

#[test]
fn registry_outliving_the_owner_is_not_required() {
    let script = SessionScript::new("s1");
    let cdm = ScriptedCdm::with_script(KEY_SYSTEM, script);
    let registry = CountingRegistry::new();
    let mut session =
        KeySession::open(&cdm, KEY_SYSTEM, no_event_target(), weak_keys_registry(&registry))
            .unwrap();

    drop(registry);

    // Default scripted outcome stores the key; the dead registry is simply
    // not notified.
    session.update(Bytes::from_static(b"key")).unwrap();
    session.run_until_idle();

    assert_eq!(cdm.probe().unwrap().update_count(), 1);
}

#[test]
fn pending_activity_tracks_handle_and_event_queue() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
    let mut session = open_session(&cdm);

    // Live handle, empty queue.
    assert!(session.has_pending_activity());

    session.generate_key_request("video/mp4", Bytes::from_static(b"init"));
    assert!(session.tick());
    assert!(session.has_pending_activity());

    // Teardown drops both the handle and the queued event.
    session.close();
    assert!(!session.has_pending_activity());
}

#[test]
fn session_identity_follows_the_live_handle() {
    let script = SessionScript::new("session-77")
        .with_cached_key("kid-1", Bytes::from_static(b"cached"));
    let cdm = ScriptedCdm::with_script(KEY_SYSTEM, script);
    let mut session = open_session(&cdm);

    assert_eq!(session.key_system(), KEY_SYSTEM);
    assert_eq!(session.session_id(), Some("session-77"));
    assert_eq!(session.cached_key_for_key_id("kid-1"), Some(Bytes::from_static(b"cached")));

    session.close();

    assert_eq!(session.session_id(), None);
    assert_eq!(session.cached_key_for_key_id("kid-1"), None);
}

struct TestContext {
    ephemeral: bool,
}

impl StorageContext for TestContext {
    fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    fn storage_root(&self) -> Option<PathBuf> {
        Some(PathBuf::from("/var/media-keys"))
    }

    fn origin_identifier(&self) -> String {
        "https_media.example_0".to_string()
    }
}

#[test]
fn storage_directory_respects_the_context() {
    let cdm = ScriptedCdm::supporting(KEY_SYSTEM);
    let session = open_session(&cdm);

    assert_eq!(
        session.storage_directory(&TestContext { ephemeral: false }),
        Some(PathBuf::from("/var/media-keys/https_media.example_0"))
    );
    assert_eq!(session.storage_directory(&TestContext { ephemeral: true }), None);
}
