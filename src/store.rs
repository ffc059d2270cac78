//! Store Engine
//!
//! The reactive store that coordinates all components.
//!
//! ## Responsibilities
//! - Own the in-memory cache of current state
//! - Expose get/set/update/subscribe to consumers
//! - Reconcile the cache on cross-context change notifications
//! - Manage the store lifecycle (active/suspended)
//!
//! ## Consistency Model
//!
//! The cache is authoritative for this context: `set_state` updates it
//! synchronously and notifies subscribers before returning, while the
//! physical storage write may still be pending in the batcher
//! (write-behind). Subscriber fan-out is synchronous and runs in
//! registration order; the registry is snapshotted first, so callbacks
//! may freely call back into the store, and an unsubscribe during
//! fan-out takes effect from the next notification on.
//!
//! Lifecycle: **Active** → `end()` → **Suspended(reason)** → `reset()`
//! → **Active**. A suspended store warns and ignores `set_state`/
//! `subscribe` but is always resurrectable; there is no terminal state.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::batch::WriteBatcher;
use crate::config::StoreOptions;
use crate::error::{MirrorError, Result};
use crate::host::{ChangeEvent, ChangeListener, StorageBackend, WatchToken};
use crate::record::{codec, expiry, StateRecord};
use crate::storage::StorageAdapter;

/// Reason recorded when a store is torn down via [`Store::end`]
const END_REASON: &str = "store has been ended";

/// Subscriber callback, invoked with the newly unwrapped state
type Callback<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;

// =============================================================================
// Subscription Handle
// =============================================================================

/// Handle returned by [`Store::subscribe`].
///
/// Dropping the handle does NOT unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe). Calling it more than once, or
/// after the store was torn down, is a safe no-op.
pub struct Subscription {
    cancel: Arc<dyn Fn() + Send + Sync>,
}

impl Subscription {
    /// Remove exactly the registration this handle was returned for
    pub fn unsubscribe(&self) {
        (self.cancel)()
    }

    /// A handle with nothing to cancel (subscribe on a suspended store)
    fn inert() -> Self {
        Self {
            cancel: Arc::new(|| {}),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// A reactive state store mirrored into shared key-value storage.
///
/// Cloning yields another handle onto the same store instance.
pub struct Store<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StoreInner<T> {
    /// Computed identity: `namespace + name`
    key: String,

    /// Key prefix this store reacts to
    namespace: String,

    ttl_hours: u64,

    /// Backend handle, used for (un)registering the change listener
    backend: Option<Arc<dyn StorageBackend>>,

    /// Record-aware persistence; `None` for a cache-only store
    adapter: Option<StorageAdapter>,

    /// Last-known record for this store's key
    cache: Mutex<Option<StateRecord<T>>>,

    /// Registered callbacks, in registration order
    subscribers: Mutex<Registry<T>>,

    /// `Some(reason)` while suspended
    suspended: Mutex<Option<String>>,

    /// Host change-listener registration, while active and persistent
    watch_token: Mutex<Option<WatchToken>>,
}

impl<T> Store<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open a store named `name` against a host backend.
    ///
    /// Construction:
    /// 1. Compute `key = namespace + name`
    /// 2. Read any existing persisted record (persistent stores only)
    /// 3. Seed: if overwriting, or nothing exists, adopt
    ///    `initial_state` (persisting it); otherwise adopt the
    ///    existing record
    /// 4. Register for cross-context change notifications, filtered to
    ///    this store's namespace
    ///
    /// With `options.persistent == false` the backend is never touched;
    /// prefer [`Store::ephemeral`] in that case.
    pub fn open(name: &str, options: StoreOptions<T>, backend: Arc<dyn StorageBackend>) -> Self {
        Self::build(name, options, Some(backend))
    }

    /// Open a cache-only store: no persistence, no cross-context sync
    pub fn ephemeral(name: &str, mut options: StoreOptions<T>) -> Self {
        options.persistent = false;
        Self::build(name, options, None)
    }

    fn build(
        name: &str,
        options: StoreOptions<T>,
        backend: Option<Arc<dyn StorageBackend>>,
    ) -> Self {
        let StoreOptions {
            initial_state,
            overwrite_existing,
            namespace,
            ttl_hours,
            persistent,
            scheduler,
        } = options;

        // Step 1: compute the store's identity
        let key = format!("{namespace}{name}");

        // Step 2: wire persistence (persistent stores only)
        let backend = backend.filter(|_| persistent);
        let adapter = backend.as_ref().map(|backend| {
            let batcher = match scheduler {
                Some(scheduler) => WriteBatcher::with_scheduler(scheduler),
                None => WriteBatcher::immediate(),
            };
            StorageAdapter::new(Arc::clone(backend), batcher)
        });

        // Step 3: adopt existing state or persist the seed
        let existing = adapter.as_ref().and_then(|a| a.get_item::<T>(&key));

        let cache = match initial_state {
            Some(seed) if overwrite_existing || existing.is_none() => match &adapter {
                Some(adapter) => adapter.set_item(&key, Some(seed), ttl_hours),
                None => Some(StateRecord::new(seed, expiry::compute_expiry(ttl_hours))),
            },
            _ => existing,
        };

        let inner = Arc::new(StoreInner {
            key,
            namespace,
            ttl_hours,
            backend,
            adapter,
            cache: Mutex::new(cache),
            subscribers: Mutex::new(Registry::default()),
            suspended: Mutex::new(None),
            watch_token: Mutex::new(None),
        });

        // Step 4: react to changes made by other contexts
        StoreInner::register_watch(&inner);

        Self { inner }
    }

    /// Current unwrapped state.
    ///
    /// An expired cache record is evicted here: removed from storage
    /// and surfaced as absent on the very read that discovers the
    /// expiry, never on a write path.
    pub fn get_state(&self) -> Option<T> {
        self.inner.current_state()
    }

    /// Replace the state.
    ///
    /// Passing `None` clears the state and removes the persisted key.
    /// Setting a value equal to the current state (deep equality at the
    /// serialized level) is a no-op: no write, no notification.
    /// Otherwise the cache updates, the write is scheduled, and every
    /// subscriber is notified synchronously in registration order.
    ///
    /// On a suspended store this warns and has no effect.
    pub fn set_state(&self, next: impl Into<Option<T>>) {
        self.apply(next.into(), None);
    }

    /// [`set_state`](Self::set_state) with a one-shot TTL override
    pub fn set_state_with_ttl(&self, next: impl Into<Option<T>>, ttl_hours: u64) {
        self.apply(next.into(), Some(ttl_hours));
    }

    /// Derive the next state from the current one.
    ///
    /// The updater sees the current unwrapped state; its result follows
    /// the same path as [`set_state`](Self::set_state). On a suspended
    /// store the updater never runs.
    pub fn update_state(&self, f: impl FnOnce(Option<T>) -> Option<T>) {
        if self.warn_if_suspended("update_state") {
            return;
        }
        let next = f(self.inner.current_state());
        self.apply(next, None);
    }

    /// [`update_state`](Self::update_state) with a one-shot TTL override
    pub fn update_state_with_ttl(&self, f: impl FnOnce(Option<T>) -> Option<T>, ttl_hours: u64) {
        if self.warn_if_suspended("update_state") {
            return;
        }
        let next = f(self.inner.current_state());
        self.apply(next, Some(ttl_hours));
    }

    /// Register a callback for state changes.
    ///
    /// Callbacks fire on local `set_state` transitions and on
    /// cross-context updates, in registration order. Registering the
    /// same callback twice creates two independent entries. On a
    /// suspended store this warns and returns an inert handle.
    pub fn subscribe(&self, callback: impl Fn(Option<&T>) + Send + Sync + 'static) -> Subscription {
        if self.warn_if_suspended("subscribe") {
            return Subscription::inert();
        }

        let id = self.inner.subscribers.lock().insert(Arc::new(callback));

        let weak = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.lock().remove(id);
                }
            }),
        }
    }

    /// Tear the store down: unregister the host change listener, clear
    /// all subscribers, and mark the store suspended.
    ///
    /// Subsequent `set_state`/`subscribe` calls warn and do nothing
    /// until [`reset`](Self::reset).
    pub fn end(&self) {
        if let Some(backend) = &self.inner.backend {
            if let Some(token) = self.inner.watch_token.lock().take() {
                backend.unwatch(token);
            }
        }

        self.inner.subscribers.lock().clear();
        *self.inner.suspended.lock() = Some(END_REASON.to_string());
    }

    /// Bring a suspended store back: restore the change-listener
    /// registration and clear the suspension. No-op on an active store.
    pub fn reset(&self) {
        if self.inner.suspended.lock().take().is_none() {
            return;
        }

        StoreInner::register_watch(&self.inner);
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// The store's computed storage key
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Configured record time-to-live in hours
    pub fn ttl_hours(&self) -> u64 {
        self.inner.ttl_hours
    }

    /// Whether state is mirrored into the host backend
    pub fn is_persistent(&self) -> bool {
        self.inner.adapter.is_some()
    }

    /// Whether the store is currently suspended
    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.lock().is_some()
    }

    /// Number of registered subscriber entries
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// The shared `set_state` path: suspension guard, idempotence
    /// check, persist, cache update, fan-out.
    fn apply(&self, next: Option<T>, ttl_override: Option<u64>) {
        if self.warn_if_suspended("set_state") {
            return;
        }

        let current = self.inner.current_state();
        if codec::states_equal(next.as_ref(), current.as_ref()) {
            return;
        }

        let ttl_hours = ttl_override.unwrap_or(self.inner.ttl_hours);
        let record = match &self.inner.adapter {
            Some(adapter) => adapter.set_item(&self.inner.key, next, ttl_hours),
            None => next.map(|state| StateRecord::new(state, expiry::compute_expiry(ttl_hours))),
        };

        *self.inner.cache.lock() = record;
        self.inner.notify();
    }

    /// Report suspended misuse on the diagnostic channel.
    /// Returns `true` when the operation must be skipped.
    fn warn_if_suspended(&self, operation: &str) -> bool {
        match self.inner.ensure_active() {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(key = %self.inner.key, operation, error = %err, "operation ignored");
                true
            }
        }
    }
}

impl<T> StoreInner<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn ensure_active(&self) -> Result<()> {
        match self.suspended.lock().as_ref() {
            Some(reason) => Err(MirrorError::Suspended(reason.clone())),
            None => Ok(()),
        }
    }

    /// Unwrap the cache, lazily evicting an expired record.
    ///
    /// The cache lock is never held across the backend call.
    fn current_state(&self) -> Option<T> {
        let expired = {
            let mut cache = self.cache.lock();
            match cache.as_ref() {
                Some(record) if expiry::is_expired(record) => {
                    *cache = None;
                    true
                }
                _ => false,
            }
        };

        if expired {
            if let Some(adapter) = &self.adapter {
                adapter.remove_item::<T>(&self.key);
            }
            return None;
        }

        self.cache.lock().as_ref().map(|record| record.state.clone())
    }

    /// Fan the current unwrapped state out to every subscriber, in
    /// registration order. The registry is snapshotted first so
    /// callbacks can re-enter the store.
    fn notify(&self) {
        let callbacks = self.subscribers.lock().snapshot();
        if callbacks.is_empty() {
            return;
        }

        let state = self.cache.lock().as_ref().map(|record| record.state.clone());
        for callback in callbacks {
            callback(state.as_ref());
        }
    }

    /// Register the cross-context change listener.
    ///
    /// The listener filters to this store's namespace and reacts only
    /// to its own key; it holds a weak reference so a dropped store
    /// does not linger in the backend's registry.
    fn register_watch(inner: &Arc<Self>) {
        let backend = match &inner.backend {
            Some(backend) => backend,
            None => return,
        };

        let weak = Arc::downgrade(inner);
        let namespace = inner.namespace.clone();

        let listener: ChangeListener = Arc::new(move |event: &ChangeEvent| {
            if !event.key.starts_with(&namespace) {
                return;
            }
            let inner = match weak.upgrade() {
                Some(inner) => inner,
                None => return,
            };
            if event.key != inner.key {
                return;
            }
            inner.apply_external(event);
        });

        let token = backend.watch(listener);
        *inner.watch_token.lock() = Some(token);
    }

    /// React to a change performed by another context: re-derive the
    /// cache from the carried value and republish to subscribers.
    ///
    /// Unlike `set_state`, the idempotence short-circuit does not apply
    /// here; an external notification is a state transition worth
    /// observing even when the value is equal.
    fn apply_external(&self, event: &ChangeEvent) {
        let record = self
            .adapter
            .as_ref()
            .and_then(|adapter| adapter.get_item_from::<T>(&self.key, event.new_value.as_deref()));

        *self.cache.lock() = record;
        self.notify();
    }
}

// =============================================================================
// Subscriber Registry
// =============================================================================

struct Registry<T> {
    entries: Vec<(u64, Callback<T>)>,
    next_id: u64,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> Registry<T> {
    fn insert(&mut self, callback: Callback<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove by registration id; absent ids are a no-op, which makes
    /// double-unsubscribe safe
    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn snapshot(&self) -> Vec<Callback<T>> {
        self.entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
