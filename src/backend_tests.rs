//! Backend tests driving `run_backend` directly over in-memory services

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::backend::run_backend;
use crate::memory::MemoryServices;
use crate::message::{Identity, LocalImageHandle, Message};
use crate::protocol::{BackendAction, GuiEvent, ImageSlot, SessionId};

const WAIT: Duration = Duration::from_secs(2);

fn alice() -> Identity {
    Identity {
        uid: "alice-uid".into(),
        display_name: Some("Alice".into()),
        photo_url: Some("https://example.com/alice.png".into()),
    }
}

fn start(services: &MemoryServices) -> (Sender<BackendAction>, Receiver<GuiEvent>, thread::JoinHandle<()>) {
    let (action_tx, action_rx) = unbounded::<BackendAction>();
    let (event_tx, event_rx) = unbounded::<GuiEvent>();
    let caps = services.capabilities();
    let handle = thread::spawn(move || run_backend(caps, action_rx, event_tx));
    (action_tx, event_rx, handle)
}

/// Wait until `check` holds or the deadline passes.
fn wait_until(check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

fn subscribe(tx: &Sender<BackendAction>, session: u64) -> SessionId {
    let session = SessionId(session);
    tx.send(BackendAction::Subscribe {
        session,
        path: "messages".into(),
    })
    .unwrap();
    session
}

#[test]
fn test_backend_exits_when_ui_drops_sender() {
    let services = MemoryServices::new("bucket", None);
    let (action_tx, _event_rx, handle) = start(&services);
    subscribe(&action_tx, 1);
    assert!(wait_until(|| services.stream.subscriber_count() == 1));

    drop(action_tx);
    let deadline = Instant::now() + WAIT;
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(handle.is_finished());
    assert_eq!(services.stream.subscriber_count(), 0);
}

#[test]
fn test_subscribe_forwards_existing_and_new_records() {
    let services = MemoryServices::new("bucket", Some(alice()));
    let (action_tx, event_rx, _handle) = start(&services);

    let session = subscribe(&action_tx, 1);
    assert!(wait_until(|| services.stream.subscriber_count() == 1));
    action_tx
        .send(BackendAction::SendText {
            session,
            path: "messages".into(),
            text: "hello".into(),
        })
        .unwrap();

    match event_rx.recv_timeout(WAIT) {
        Ok(GuiEvent::MessageAdded {
            session: s,
            message,
            ..
        }) => {
            assert_eq!(s, session);
            assert_eq!(message.text.as_deref(), Some("hello"));
            assert_eq!(message.sender_name.as_deref(), Some("Alice"));
            assert_eq!(
                message.sender_photo_url.as_deref(),
                Some("https://example.com/alice.png")
            );
        }
        other => panic!("Expected MessageAdded, got {:?}", other),
    }
}

#[test]
fn test_text_without_identity_has_no_sender() {
    let services = MemoryServices::new("bucket", None);
    let (action_tx, _event_rx, _handle) = start(&services);
    action_tx
        .send(BackendAction::SendText {
            session: SessionId(1),
            path: "messages".into(),
            text: "anon".into(),
        })
        .unwrap();
    assert!(wait_until(|| services.stream.append_count() == 1));
    let stored = services.stream.messages("messages");
    assert_eq!(stored[0].sender_name, None);
    assert_eq!(stored[0].text.as_deref(), Some("anon"));
}

#[test]
fn test_unsubscribe_stops_forwarding() {
    let services = MemoryServices::new("bucket", Some(alice()));
    let (action_tx, event_rx, _handle) = start(&services);

    let session = subscribe(&action_tx, 1);
    assert!(wait_until(|| services.stream.subscriber_count() == 1));
    action_tx.send(BackendAction::Unsubscribe { session }).unwrap();
    assert!(wait_until(|| services.stream.subscriber_count() == 0));

    services
        .stream
        .deliver("messages", "late", Message::text("late").to_value());
    assert!(event_rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_image_upload_appends_reference() {
    let services = MemoryServices::new("bucket", Some(alice()));
    let (action_tx, _event_rx, _handle) = start(&services);
    let session = subscribe(&action_tx, 1);

    action_tx
        .send(BackendAction::SendImage {
            session,
            path: "messages".into(),
            image: LocalImageHandle::Captured {
                jpeg: Bytes::from_static(b"\xff\xd8jpeg"),
            },
        })
        .unwrap();

    assert!(wait_until(|| services.stream.append_count() == 1));
    let stored = services.stream.messages("messages");
    let reference = stored[0].image_reference.clone().unwrap();
    assert!(reference.starts_with("gs://bucket/alice-uid/"));
    assert!(reference.ends_with(".jpg"));
    assert_eq!(stored[0].text, None);
    assert_eq!(stored[0].sender_name.as_deref(), Some("Alice"));

    let path = reference.trim_start_matches("gs://bucket/");
    assert_eq!(services.store.content_type(path).as_deref(), Some("image/jpeg"));
}

#[test]
fn test_image_upload_failure_appends_nothing() {
    let services = MemoryServices::new("bucket", Some(alice()));
    services.store.set_fail_uploads(true);
    let (action_tx, _event_rx, _handle) = start(&services);
    let session = subscribe(&action_tx, 1);

    action_tx
        .send(BackendAction::SendImage {
            session,
            path: "messages".into(),
            image: LocalImageHandle::Captured {
                jpeg: Bytes::from_static(b"jpeg"),
            },
        })
        .unwrap();

    assert!(wait_until(|| services.store.upload_count() == 1));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(services.stream.append_count(), 0);
}

#[test]
fn test_image_upload_needs_identity() {
    let services = MemoryServices::new("bucket", None);
    let (action_tx, _event_rx, _handle) = start(&services);
    let session = subscribe(&action_tx, 1);
    action_tx
        .send(BackendAction::SendImage {
            session,
            path: "messages".into(),
            image: LocalImageHandle::Captured {
                jpeg: Bytes::from_static(b"jpeg"),
            },
        })
        .unwrap();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(services.store.upload_count(), 0);
    assert_eq!(services.stream.append_count(), 0);
}

#[test]
fn test_resolve_routes_by_scheme() {
    let services = MemoryServices::new("bucket", None);
    let reference = services.store.insert("a/b.jpg", Bytes::from_static(b"stored"));
    services
        .fetcher
        .insert("https://cdn.example.com/c.png", Bytes::from_static(b"fetched"));
    let (action_tx, event_rx, _handle) = start(&services);
    let session = SessionId(1);

    action_tx
        .send(BackendAction::ResolveImage {
            session,
            index: 0,
            slot: ImageSlot::Content,
            reference,
        })
        .unwrap();
    match event_rx.recv_timeout(WAIT) {
        Ok(GuiEvent::ImageResolved { index: 0, image, .. }) => {
            assert_eq!(image, Some(Bytes::from_static(b"stored")));
        }
        other => panic!("Expected ImageResolved, got {:?}", other),
    }
    assert_eq!(services.store.resolve_count(), 1);
    assert_eq!(services.fetcher.fetch_count(), 0);

    action_tx
        .send(BackendAction::ResolveImage {
            session,
            index: 1,
            slot: ImageSlot::Content,
            reference: "https://cdn.example.com/c.png".into(),
        })
        .unwrap();
    match event_rx.recv_timeout(WAIT) {
        Ok(GuiEvent::ImageResolved { index: 1, image, .. }) => {
            assert_eq!(image, Some(Bytes::from_static(b"fetched")));
        }
        other => panic!("Expected ImageResolved, got {:?}", other),
    }
    assert_eq!(services.store.resolve_count(), 1);
    assert_eq!(services.fetcher.fetch_count(), 1);
}

#[test]
fn test_resolve_failure_reports_no_image() {
    let services = MemoryServices::new("bucket", None);
    let (action_tx, event_rx, _handle) = start(&services);
    action_tx
        .send(BackendAction::ResolveImage {
            session: SessionId(1),
            index: 0,
            slot: ImageSlot::Avatar,
            reference: "not a url".into(),
        })
        .unwrap();
    match event_rx.recv_timeout(WAIT) {
        Ok(GuiEvent::ImageResolved { image, slot, .. }) => {
            assert_eq!(image, None);
            assert_eq!(slot, ImageSlot::Avatar);
        }
        other => panic!("Expected ImageResolved, got {:?}", other),
    }
}

#[test]
fn test_config_fetch_success_and_failure() {
    let services = MemoryServices::new("bucket", None);
    let (action_tx, event_rx, _handle) = start(&services);

    action_tx
        .send(BackendAction::FetchConfig {
            expiration: Duration::from_secs(3600),
        })
        .unwrap();
    match event_rx.recv_timeout(WAIT) {
        Ok(GuiEvent::ConfigFetched(value)) => assert_eq!(value.friendly_msg_length, 10.0),
        other => panic!("Expected ConfigFetched, got {:?}", other),
    }
    assert_eq!(
        services.remote_config.last_expiration(),
        Some(Duration::from_secs(3600))
    );

    services.remote_config.set_response(Err("throttled".into()));
    action_tx
        .send(BackendAction::FetchConfig {
            expiration: Duration::ZERO,
        })
        .unwrap();
    assert!(wait_until(|| services.remote_config.fetch_count() == 2));
    assert!(event_rx.recv_timeout(Duration::from_millis(150)).is_err());
}

#[test]
fn test_sign_out_events() {
    let services = MemoryServices::new("bucket", Some(alice()));
    let (action_tx, event_rx, _handle) = start(&services);

    services.identity.set_fail_sign_out(true);
    action_tx.send(BackendAction::SignOut).unwrap();
    assert!(event_rx.recv_timeout(Duration::from_millis(200)).is_err());

    services.identity.set_fail_sign_out(false);
    action_tx.send(BackendAction::SignOut).unwrap();
    assert!(matches!(event_rx.recv_timeout(WAIT), Ok(GuiEvent::SignedOut)));
}
