//! In-memory storage backend
//!
//! Reference [`StorageBackend`] over a shared in-process keyspace.
//! Suitable for testing, non-browser hosts, and as the executable model
//! of the host contract: each handle is one execution context, and a
//! write through one handle notifies the listeners of every other
//! handle sharing the keyspace.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{ChangeEvent, ChangeListener, StorageBackend, WatchToken};

/// In-memory implementation of [`StorageBackend`].
///
/// ## Concurrency:
/// - `data`: RwLock (many concurrent readers, exclusive writer)
/// - `listeners`: Mutex, snapshotted before dispatch so listeners can
///   freely touch the backend
/// - counters: atomic, lock-free
pub struct MemoryBackend {
    shared: Arc<Shared>,

    /// Which execution context this handle represents
    context: u64,
}

struct Shared {
    /// The keyspace shared by every context
    data: RwLock<BTreeMap<String, String>>,

    /// Registered change listeners, tagged by owning context
    listeners: Mutex<Vec<ListenerEntry>>,

    next_context: AtomicU64,
    next_token: AtomicU64,

    /// Physical operation counters (for observability and tests)
    reads: AtomicUsize,
    writes: AtomicUsize,
}

struct ListenerEntry {
    context: u64,
    token: u64,
    listener: ChangeListener,
}

impl MemoryBackend {
    /// Create a fresh keyspace and a handle for its first context
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(BTreeMap::new()),
                listeners: Mutex::new(Vec::new()),
                next_context: AtomicU64::new(1),
                next_token: AtomicU64::new(1),
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
            }),
            context: 0,
        }
    }

    /// Open another execution context (another "tab") on the same
    /// shared keyspace. Writes in one context notify the others.
    pub fn new_context(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            context: self.shared.next_context.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Number of entries in the keyspace
    pub fn len(&self) -> usize {
        self.shared.data.read().len()
    }

    /// Check if the keyspace is empty
    pub fn is_empty(&self) -> bool {
        self.shared.data.read().is_empty()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Physical reads performed across all contexts
    pub fn read_count(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    /// Physical writes performed across all contexts
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Deliver a change to every context except this one.
    ///
    /// Listeners are snapshotted first so a listener may watch,
    /// unwatch, or write without deadlocking the registry.
    fn publish(&self, key: &str, new_value: Option<String>) {
        let recipients: Vec<ChangeListener> = {
            let listeners = self.shared.listeners.lock();
            listeners
                .iter()
                .filter(|entry| entry.context != self.context)
                .map(|entry| Arc::clone(&entry.listener))
                .collect()
        };

        if recipients.is_empty() {
            return;
        }

        let event = ChangeEvent {
            key: key.to_string(),
            new_value,
        };

        for listener in recipients {
            listener(&event);
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.shared.reads.fetch_add(1, Ordering::SeqCst);
        self.shared.data.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.shared
            .data
            .write()
            .insert(key.to_string(), value.to_string());
        self.shared.writes.fetch_add(1, Ordering::SeqCst);

        self.publish(key, Some(value.to_string()));
    }

    fn remove(&self, key: &str) {
        let existed = self.shared.data.write().remove(key).is_some();

        // Removing an absent key changes nothing; no event
        if existed {
            self.publish(key, None);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.shared.data.read().keys().cloned().collect()
    }

    fn watch(&self, listener: ChangeListener) -> WatchToken {
        let token = self.shared.next_token.fetch_add(1, Ordering::SeqCst);
        self.shared.listeners.lock().push(ListenerEntry {
            context: self.context,
            token,
            listener,
        });
        WatchToken(token)
    }

    fn unwatch(&self, token: WatchToken) {
        self.shared
            .listeners
            .lock()
            .retain(|entry| entry.token != token.0);
    }
}
