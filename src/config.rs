//! Configuration for mirrorkv stores
//!
//! Centralized store options with sensible defaults.

use std::sync::Arc;

use crate::batch::Scheduler;

/// Default key prefix partitioning the shared storage keyspace.
///
/// Every key a store reads, writes, or reacts to starts with its
/// namespace, so independent stores can coexist in one keyspace
/// without cross-talk.
pub const DEFAULT_NAMESPACE: &str = "_mkv-";

/// Default record time-to-live in hours. `0` disables expiration.
pub const DEFAULT_TTL_HOURS: u64 = 24;

/// Options for opening a store
pub struct StoreOptions<T> {
    // -------------------------------------------------------------------------
    // Seeding Configuration
    // -------------------------------------------------------------------------
    /// Seed value adopted when no persisted record exists (or
    /// unconditionally when `overwrite_existing` is set).
    pub initial_state: Option<T>,

    /// Force-replace any existing persisted state with `initial_state`
    pub overwrite_existing: bool,

    // -------------------------------------------------------------------------
    // Keyspace Configuration
    // -------------------------------------------------------------------------
    /// Key prefix; the store's key is `namespace + name`
    pub namespace: String,

    // -------------------------------------------------------------------------
    // Persistence Configuration
    // -------------------------------------------------------------------------
    /// Record time-to-live in hours (`0` = never expires)
    pub ttl_hours: u64,

    /// Whether state is mirrored into the host backend at all.
    /// When `false`, state lives only in the in-memory cache and no
    /// cross-context sync occurs.
    pub persistent: bool,

    /// Tick source for the write batcher. With no scheduler, physical
    /// writes execute synchronously and immediately.
    pub scheduler: Option<Arc<dyn Scheduler>>,
}

impl<T> Default for StoreOptions<T> {
    fn default() -> Self {
        Self {
            initial_state: None,
            overwrite_existing: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl_hours: DEFAULT_TTL_HOURS,
            persistent: true,
            scheduler: None,
        }
    }
}

impl<T> StoreOptions<T> {
    /// Create a new options builder
    pub fn builder() -> StoreOptionsBuilder<T> {
        StoreOptionsBuilder::default()
    }
}

/// Builder for StoreOptions
pub struct StoreOptionsBuilder<T> {
    options: StoreOptions<T>,
}

impl<T> Default for StoreOptionsBuilder<T> {
    fn default() -> Self {
        Self {
            options: StoreOptions::default(),
        }
    }
}

impl<T> StoreOptionsBuilder<T> {
    /// Set the seed value for first-time construction
    pub fn initial_state(mut self, state: T) -> Self {
        self.options.initial_state = Some(state);
        self
    }

    /// Force-replace any existing persisted state with the seed value
    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.options.overwrite_existing = overwrite;
        self
    }

    /// Set the key prefix
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.options.namespace = namespace.into();
        self
    }

    /// Set the record time-to-live in hours (`0` = never expires)
    pub fn ttl_hours(mut self, hours: u64) -> Self {
        self.options.ttl_hours = hours;
        self
    }

    /// Set whether state is mirrored into the host backend
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.options.persistent = persistent;
        self
    }

    /// Set the tick source for the write batcher
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.options.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> StoreOptions<T> {
        self.options
    }
}
