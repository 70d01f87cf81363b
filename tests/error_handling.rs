//! Removal races, disposal and other edge cases.

use eventstream::{EventStream, EventType, Listener, StreamError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_listener() -> (Arc<AtomicUsize>, Listener<u8>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();
    let listener = Listener::new(move |_: &u8| {
        counted.fetch_add(1, Ordering::SeqCst);
    });
    (hits, listener)
}

// --- Redundant removal ---

#[test]
fn test_remove_never_added_listener() {
    let stream: EventStream = EventStream::new();
    let (_, listener) = counting_listener();

    // No entry for the type at all
    stream.remove_listener(&listener);
    assert!(stream.listened_types().is_empty());
}

#[test]
fn test_remove_listener_twice() {
    let stream: EventStream = EventStream::new();
    let (_, kept) = counting_listener();
    let (_, removed) = counting_listener();
    stream.add_listener(&kept).unwrap();
    stream.add_listener(&removed).unwrap();

    stream.remove_listener(&removed);
    stream.remove_listener(&removed);

    assert_eq!(stream.subscription_count(EventType::of::<u8>()), 1);
}

#[test]
fn test_remove_unlinked_stream() {
    let a: EventStream = EventStream::new();
    let b: EventStream = EventStream::new();
    let (_, listener) = counting_listener();
    b.add_listener(&listener).unwrap();

    a.remove_listener_stream(&b);
    assert_eq!(b.source_count(), 0);

    a.add_listener_stream(&b).unwrap();
    a.remove_listener_stream(&b);
    a.remove_listener_stream(&b);

    assert!(!a.forwards_to(&b));
    assert!(!a.listens_to::<u8>());
    assert!(b.listens_to::<u8>());
}

#[test]
fn test_removing_unrelated_listener_keeps_registrations() {
    let a: EventStream = EventStream::new();
    let b: EventStream = EventStream::new();
    a.add_listener_stream(&b).unwrap();
    let (_, listener) = counting_listener();
    let (_, stranger) = counting_listener();
    b.add_listener(&listener).unwrap();

    b.remove_listener(&stranger);

    assert_eq!(a.forward_registrations(EventType::of::<u8>(), &b), 1);
}

// --- Disposal ---

#[test]
fn test_dispose_severs_fully() {
    let a: EventStream = EventStream::labeled("a");
    let b: EventStream = EventStream::labeled("b");
    a.add_listener_stream(&b).unwrap();
    let (hits, listener) = counting_listener();
    b.add_listener(&listener).unwrap();

    a.dispose();
    a.trigger_event(0u8);

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!b.has_source(&a));
    assert_eq!(b.source_count(), 0);
    assert!(a.listened_types().is_empty());
    assert!(a.is_disposed());

    // The peer is untouched
    b.trigger_event(0u8);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dispose_middle_of_chain_cleans_upstream() {
    let a: EventStream = EventStream::new();
    let b: EventStream = EventStream::new();
    let c: EventStream = EventStream::new();
    a.add_listener_stream(&b).unwrap();
    b.add_listener_stream(&c).unwrap();
    let (hits, listener) = counting_listener();
    c.add_listener(&listener).unwrap();
    assert!(a.listens_to::<u8>());

    b.dispose();

    assert!(!a.listens_to::<u8>());
    assert_eq!(a.forward_count(), 0);
    assert_eq!(c.source_count(), 0);
    assert!(c.listens_to::<u8>());

    a.trigger_event(0u8);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dispose_is_idempotent() {
    let stream: EventStream = EventStream::new();
    let (_, listener) = counting_listener();
    stream.add_listener(&listener).unwrap();

    stream.dispose();
    stream.dispose();

    assert!(stream.is_disposed());
    assert!(stream.listened_types().is_empty());
}

#[test]
fn test_disposed_stream_rejects_growth() {
    let stream: EventStream = EventStream::labeled("gone");
    let other: EventStream = EventStream::new();
    let (_, listener) = counting_listener();
    stream.dispose();

    assert_eq!(
        stream.add_listener(&listener),
        Err(StreamError::Disposed {
            label: "gone".to_string()
        })
    );
    assert!(stream.add_listener_stream(&other).is_err());
    assert!(other.add_listener_stream(&stream).is_err());
    assert!(stream.subscribe(|_: &u8| {}).is_err());

    assert_eq!(other.forward_count(), 0);
    assert_eq!(other.source_count(), 0);
}

#[test]
fn test_remove_after_dispose_is_noop() {
    let stream: EventStream = EventStream::new();
    let (_, listener) = counting_listener();
    stream.add_listener(&listener).unwrap();
    stream.dispose();

    // A consumer tearing down after the stream went away
    stream.remove_listener(&listener);
    stream.remove_listener_stream(&EventStream::new());
}

#[test]
fn test_disposed_error_message() {
    let stream: EventStream = EventStream::new();
    stream.dispose();
    let err = stream.add_listener_stream(&EventStream::new()).unwrap_err();
    assert_eq!(err.to_string(), "Event stream is disposed: <unlabeled>");
}

#[test]
fn test_listener_disposing_its_stream_mid_dispatch() {
    let stream: EventStream = EventStream::new();
    let (hits, later) = counting_listener();

    let handle = stream.clone();
    let disposer = Listener::new(move |_: &u8| handle.dispose());
    stream.add_listener(&disposer).unwrap();
    stream.add_listener(&later).unwrap();

    // The snapshot still reaches the second listener
    stream.trigger_event(0u8);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    stream.trigger_event(0u8);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
