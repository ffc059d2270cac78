//! Tests for the store engine
//!
//! These tests verify:
//! - Construction and seed semantics
//! - get/set/update operations and the idempotence guarantee
//! - Subscription fan-out and unsubscription
//! - TTL expiration through the store surface
//! - Lifecycle (end/reset)

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use mirrorkv::record::{codec, StateRecord};
use mirrorkv::{MemoryBackend, StorageBackend, Store, StoreOptions, DEFAULT_TTL_HOURS};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

/// Subscribe a recording callback; returns the list of observed states.
fn record_states<T: Clone + Send + 'static>(store: &Store<T>) -> Arc<Mutex<Vec<Option<T>>>>
where
    T: Serialize + for<'de> Deserialize<'de> + Sync,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |state| sink.lock().push(state.cloned()));
    seen
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_open_computes_namespaced_key() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("counter", StoreOptions::default(), backend);

    assert_eq!(store.key(), "_mkv-counter");
    assert_eq!(store.ttl_hours(), DEFAULT_TTL_HOURS);
    assert!(store.is_persistent());
    assert!(!store.is_suspended());
}

#[test]
fn test_initial_state_seeds_empty_storage() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend.clone(),
    );

    assert_eq!(store.get_state(), Some(1));
    assert!(backend.get("_mkv-s").is_some()); // seed was persisted
}

#[test]
fn test_existing_state_wins_without_overwrite() {
    let backend = setup_backend();
    let text = codec::encode(&StateRecord::new(0, 0)).unwrap();
    backend.set("_mkv-s", &text);

    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend,
    );

    assert_eq!(store.get_state(), Some(0));
}

#[test]
fn test_overwrite_existing_replaces_persisted_state() {
    let backend = setup_backend();
    let text = codec::encode(&StateRecord::new(0, 0)).unwrap();
    backend.set("_mkv-s", &text);

    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder()
            .initial_state(1)
            .overwrite_existing(true)
            .build(),
        backend,
    );

    assert_eq!(store.get_state(), Some(1));
}

#[test]
fn test_no_seed_adopts_absent_state() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend.clone());

    assert_eq!(store.get_state(), None);
    assert!(backend.is_empty());
}

#[test]
fn test_custom_namespace_partitions_keys() {
    let backend = setup_backend();
    let a: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().namespace("app1-").initial_state(1).build(),
        backend.clone(),
    );
    let b: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().namespace("app2-").initial_state(2).build(),
        backend,
    );

    assert_eq!(a.get_state(), Some(1));
    assert_eq!(b.get_state(), Some(2));
}

// =============================================================================
// Get/Set Tests
// =============================================================================

#[test]
fn test_set_then_get() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend,
    );
    let seen = record_states(&store);

    store.set_state(2);

    assert_eq!(store.get_state(), Some(2));
    assert_eq!(seen.lock().as_slice(), &[Some(2)]);
}

#[test]
fn test_round_trip_preserves_structured_state() {
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
    }

    let backend = setup_backend();
    let store: Store<Profile> = Store::open("profile", StoreOptions::default(), backend);

    let value = Profile {
        name: "ada".to_string(),
        tags: vec!["x".to_string(), "y".to_string()],
    };
    store.set_state(value.clone());

    assert_eq!(store.get_state(), Some(value));
}

#[test]
fn test_set_state_none_clears_state_and_storage() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend.clone(),
    );

    store.set_state(None);

    assert_eq!(store.get_state(), None);
    assert_eq!(backend.get("_mkv-s"), None);
}

#[test]
fn test_update_state_sees_current_state() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(10).build(),
        backend,
    );

    store.update_state(|state| state.map(|n| n + 5));

    assert_eq!(store.get_state(), Some(15));
}

#[test]
fn test_update_state_on_empty_store_sees_none() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);

    store.update_state(|state| {
        assert_eq!(state, None);
        Some(1)
    });

    assert_eq!(store.get_state(), Some(1));
}

#[test]
fn test_cache_serves_repeated_reads_without_storage_queries() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend.clone(),
    );

    let reads_after_open = backend.read_count();
    store.get_state();
    store.get_state();
    store.get_state();

    assert_eq!(backend.read_count(), reads_after_open);
}

// =============================================================================
// Idempotence Tests
// =============================================================================

#[test]
fn test_equal_value_writes_nothing_and_notifies_nobody() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend.clone(),
    );
    let seen = record_states(&store);
    let writes_before = backend.write_count();

    store.set_state(1);

    assert!(seen.lock().is_empty());
    assert_eq!(backend.write_count(), writes_before);
}

#[test]
fn test_equality_is_deep_not_referential() {
    let backend = setup_backend();
    let store: Store<Vec<String>> = Store::open(
        "s",
        StoreOptions::builder()
            .initial_state(vec!["a".to_string()])
            .build(),
        backend,
    );
    let seen = record_states(&store);

    // A fresh but equal vector must still short-circuit
    store.set_state(vec!["a".to_string()]);
    assert!(seen.lock().is_empty());

    store.set_state(vec!["b".to_string()]);
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn test_clearing_an_empty_store_is_a_no_op() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);
    let seen = record_states(&store);

    store.set_state(None);

    assert!(seen.lock().is_empty());
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[test]
fn test_subscribers_notified_in_registration_order() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);

    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let second = Arc::clone(&order);
    store.subscribe(move |_| first.lock().push("first"));
    store.subscribe(move |_| second.lock().push("second"));

    store.set_state(1);

    assert_eq!(order.lock().as_slice(), &["first", "second"]);
}

#[test]
fn test_unsubscribe_stops_notifications() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = store.subscribe(move |state: Option<&i32>| sink.lock().push(state.copied()));

    store.set_state(1);
    sub.unsubscribe();
    store.set_state(2);

    assert_eq!(seen.lock().as_slice(), &[Some(1)]);
}

#[test]
fn test_double_unsubscribe_is_safe() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);

    let sub = store.subscribe(|_| {});
    sub.unsubscribe();
    sub.unsubscribe();

    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn test_duplicate_registrations_are_independent() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);

    let count = Arc::new(Mutex::new(0));
    let callback = {
        let count = Arc::clone(&count);
        move |_: Option<&i32>| *count.lock() += 1
    };

    let first = store.subscribe(callback.clone());
    let _second = store.subscribe(callback);
    assert_eq!(store.subscriber_count(), 2);

    first.unsubscribe();
    assert_eq!(store.subscriber_count(), 1);

    store.set_state(1);
    assert_eq!(*count.lock(), 1);
}

// =============================================================================
// Expiration Tests
// =============================================================================

#[test]
fn test_expired_record_reads_absent_and_is_removed() {
    let backend = setup_backend();
    let text = codec::encode(&StateRecord::new(7, 1)).unwrap(); // expired long ago
    backend.set("_mkv-s", &text);

    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend.clone());

    assert_eq!(store.get_state(), None);
    assert_eq!(backend.get("_mkv-s"), None);
}

#[test]
fn test_zero_ttl_record_never_expires() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).ttl_hours(0).build(),
        backend.clone(),
    );

    let raw = backend.get("_mkv-s").unwrap();
    let record: StateRecord<i32> = codec::decode(Some(&raw)).unwrap();

    assert_eq!(record.expires, 0);
    assert_eq!(store.get_state(), Some(1));
}

#[test]
fn test_configured_ttl_stamps_expiry() {
    let backend = setup_backend();
    let _store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).ttl_hours(12).build(),
        backend.clone(),
    );

    let raw = backend.get("_mkv-s").unwrap();
    let record: StateRecord<i32> = codec::decode(Some(&raw)).unwrap();

    assert!(record.expires > mirrorkv::record::expiry::now_ms());
}

#[test]
fn test_ttl_override_applies_to_single_write() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().ttl_hours(0).build(),
        backend.clone(),
    );

    store.set_state_with_ttl(1, 12);
    let raw = backend.get("_mkv-s").unwrap();
    let record: StateRecord<i32> = codec::decode(Some(&raw)).unwrap();
    assert_ne!(record.expires, 0);

    store.set_state(2);
    let raw = backend.get("_mkv-s").unwrap();
    let record: StateRecord<i32> = codec::decode(Some(&raw)).unwrap();
    assert_eq!(record.expires, 0); // back to the configured ttl
}

// =============================================================================
// Non-Persistent Store Tests
// =============================================================================

#[test]
fn test_ephemeral_store_never_touches_storage() {
    let store: Store<i32> = Store::ephemeral(
        "scratch",
        StoreOptions::builder().initial_state(1).build(),
    );
    let seen = record_states(&store);

    store.set_state(2);

    assert_eq!(store.get_state(), Some(2));
    assert!(!store.is_persistent());
    assert_eq!(seen.lock().as_slice(), &[Some(2)]);
}

#[test]
fn test_persistent_false_option_ignores_backend() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).persistent(false).build(),
        backend.clone(),
    );

    store.set_state(2);

    assert_eq!(store.get_state(), Some(2));
    assert_eq!(backend.write_count(), 0);
    assert_eq!(backend.read_count(), 0);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_end_suspends_and_clears_subscribers() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend,
    );
    store.subscribe(|_| {});

    store.end();

    assert!(store.is_suspended());
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn test_set_state_on_suspended_store_has_no_effect() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend,
    );

    store.end();
    store.set_state(2);

    assert_eq!(store.get_state(), Some(1));
}

#[test]
fn test_subscribe_on_suspended_store_returns_inert_handle() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);

    store.end();
    let sub = store.subscribe(|_| {});
    sub.unsubscribe(); // must be a safe no-op

    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn test_reset_restores_normal_operation() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open(
        "s",
        StoreOptions::builder().initial_state(1).build(),
        backend,
    );

    store.end();
    store.set_state(2);
    assert_eq!(store.get_state(), Some(1));

    store.reset();
    assert!(!store.is_suspended());

    let seen = record_states(&store);
    store.set_state(2);

    assert_eq!(store.get_state(), Some(2));
    assert_eq!(seen.lock().as_slice(), &[Some(2)]);
}

#[test]
fn test_reset_on_active_store_is_a_no_op() {
    let backend = setup_backend();
    let store: Store<i32> = Store::open("s", StoreOptions::default(), backend);
    let seen = record_states(&store);

    store.reset();
    store.set_state(1);

    assert_eq!(seen.lock().as_slice(), &[Some(1)]);
}
