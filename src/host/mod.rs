//! Host Module
//!
//! The seam to the host's durable key-value storage and its
//! change-notification channel.
//!
//! ## Responsibilities
//! - Define the [`StorageBackend`] trait the engine depends on
//! - Define the change event delivered across execution contexts
//! - Provide an in-memory reference backend with multi-context fan-out
//!
//! The engine never assumes a singleton host object; it receives a
//! backend as an injected collaborator. Per-key read/write atomicity is
//! the backend's responsibility: readers see an old or a new complete
//! value, never a partial write.

mod memory;

pub use memory::MemoryBackend;

use std::sync::Arc;

/// A change to the shared keyspace, pushed to every execution context
/// except the one that performed the write.
///
/// `new_value` carries the raw new text (`None` for a removal) so
/// reacting contexts can re-derive state without a redundant read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The key that changed
    pub key: String,

    /// The raw new value, or `None` if the key was removed
    pub new_value: Option<String>,
}

/// Callback invoked for each [`ChangeEvent`]
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle identifying a registered change listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchToken(pub(crate) u64);

/// The host key-value store plus its change-notification channel.
///
/// Backends are handles: a handle represents one execution context
/// (one "tab"). Writes through a handle notify the listeners of every
/// *other* context sharing the keyspace, never the writer's own.
pub trait StorageBackend: Send + Sync {
    /// Read the raw text stored at `key`
    fn get(&self, key: &str) -> Option<String>;

    /// Write raw text at `key`
    fn set(&self, key: &str, value: &str);

    /// Remove `key` from the keyspace
    fn remove(&self, key: &str);

    /// Snapshot of every key in the keyspace (used by pruning)
    fn keys(&self) -> Vec<String>;

    /// Register a listener for changes performed by other contexts
    fn watch(&self, listener: ChangeListener) -> WatchToken;

    /// Remove a previously registered listener
    fn unwatch(&self, token: WatchToken);
}
