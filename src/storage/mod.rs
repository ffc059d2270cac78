//! Storage Module
//!
//! Record-aware adapter over the host key-value backend.
//!
//! ## Responsibilities
//! - Read/write/remove [`StateRecord`]s through the codec and the
//!   expiration policy
//! - Lazily evict expired records on the read that discovers them
//! - Batch physical writes through the [`WriteBatcher`] (write-behind:
//!   callers trust the returned record immediately, durability follows
//!   within the tick)
//! - Prune the keyspace of expired records (housekeeping)
//!
//! The adapter deals in keys, text, and records; it knows nothing about
//! caches, subscribers, or store lifecycle.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::batch::WriteBatcher;
use crate::host::StorageBackend;
use crate::record::{codec, expiry, StateRecord};

/// Record-aware view of a host backend
pub struct StorageAdapter {
    backend: Arc<dyn StorageBackend>,
    batcher: WriteBatcher,
}

impl StorageAdapter {
    /// Create an adapter over `backend`, batching physical writes
    /// through `batcher`
    pub fn new(backend: Arc<dyn StorageBackend>, batcher: WriteBatcher) -> Self {
        Self { backend, batcher }
    }

    /// Read the record stored at `key`.
    ///
    /// An expired record is removed from storage and reported as
    /// absent on this very read (lazy eviction). Malformed or
    /// foreign-tagged text reads as absent without being touched.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<StateRecord<T>> {
        let raw = self.backend.get(key);
        self.interpret(key, raw.as_deref())
    }

    /// Interpret a change notification's carried value for `key`,
    /// bypassing a redundant backend read. Expiry and tag checks apply
    /// exactly as in [`get_item`](Self::get_item).
    pub fn get_item_from<T: DeserializeOwned>(
        &self,
        key: &str,
        carried: Option<&str>,
    ) -> Option<StateRecord<T>> {
        self.interpret(key, carried)
    }

    /// Persist `state` at `key` with the given TTL.
    ///
    /// A `None` state removes the key and returns `None`. Otherwise the
    /// constructed record is returned immediately and is authoritative
    /// for the caller; the physical write happens through the batcher
    /// within the tick. On encode failure the write is skipped and
    /// reported, but the record is still returned so in-memory state
    /// keeps working without durability.
    pub fn set_item<T: Serialize>(
        &self,
        key: &str,
        state: Option<T>,
        ttl_hours: u64,
    ) -> Option<StateRecord<T>> {
        let state = match state {
            None => return self.remove_item(key),
            Some(state) => state,
        };

        let record = StateRecord::new(state, expiry::compute_expiry(ttl_hours));

        match codec::encode(&record) {
            Ok(text) => {
                let backend = Arc::clone(&self.backend);
                let write_key = key.to_string();
                self.batcher
                    .schedule(key, move || backend.set(&write_key, &text));
            }
            Err(err) => {
                tracing::error!(key, error = %err, "state not persisted; continuing in memory only");
            }
        }

        Some(record)
    }

    /// Remove `key` from storage. Always yields `None`, for caller
    /// convenience on the "state cleared" path.
    pub fn remove_item<T>(&self, key: &str) -> Option<StateRecord<T>> {
        let backend = Arc::clone(&self.backend);
        let remove_key = key.to_string();
        self.batcher
            .schedule(key, move || backend.remove(&remove_key));

        None
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn interpret<T: DeserializeOwned>(
        &self,
        key: &str,
        raw: Option<&str>,
    ) -> Option<StateRecord<T>> {
        let record = codec::decode::<T>(raw)?;

        if expiry::is_expired(&record) {
            return self.remove_item(key);
        }

        Some(record)
    }
}

// =============================================================================
// Keyspace Housekeeping
// =============================================================================

/// Scan the whole keyspace and remove expired records this crate owns
/// (or every record it owns, when `remove_all` is set).
///
/// Entries without this crate's record tag are never touched. Removals
/// are direct backend calls; pruning runs outside the hot path and is
/// not part of the per-store contract.
///
/// Returns the number of keys removed.
pub fn prune(backend: &dyn StorageBackend, remove_all: bool) -> usize {
    let mut removed = 0;

    for key in backend.keys() {
        let raw = backend.get(&key);
        let record = match codec::decode::<serde_json::Value>(raw.as_deref()) {
            Some(record) => record,
            None => continue, // foreign or malformed entry; not ours to manage
        };

        if remove_all || expiry::is_expired(&record) {
            backend.remove(&key);
            removed += 1;
        }
    }

    removed
}
