//! # mirrorkv
//!
//! A small client-side reactive state store whose state is mirrored
//! into a host's durable key-value storage and kept consistent across
//! execution contexts (e.g. browser tabs) sharing that storage, with:
//! - Tagged JSON records with time-to-live expiration
//! - Publish/subscribe change notification
//! - Cross-context synchronization via storage change events
//! - Per-key write batching (write-behind)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Consumers                              │
//! │         (UI bindings, application code: subscribe/           │
//! │              get_state/set_state/end/reset)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Store Engine                              │
//! │         (cache, subscribers, lifecycle, sync)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Storage   │          │    Host     │
//!   │   Adapter   │─────────▶│   Backend   │
//!   └──────┬──────┘  batched └─────────────┘
//!          │          writes    (shared keyspace +
//!          ▼                     change events)
//!   ┌─────────────┐
//!   │Record Codec │
//!   │  + Expiry   │
//!   └─────────────┘
//! ```
//!
//! Consumers only ever talk to the [`Store`]; it delegates durability
//! to the storage adapter, which delegates format concerns to the
//! record codec and expiration policy and batches physical writes.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use mirrorkv::{MemoryBackend, Store, StoreOptions};
//!
//! let backend = Arc::new(MemoryBackend::new());
//!
//! let store: Store<i32> = Store::open(
//!     "counter",
//!     StoreOptions::builder().initial_state(1).build(),
//!     backend.clone(),
//! );
//!
//! assert_eq!(store.get_state(), Some(1));
//!
//! let sub = store.subscribe(|state| {
//!     println!("counter is now {state:?}");
//! });
//!
//! store.set_state(2);
//! assert_eq!(store.get_state(), Some(2));
//!
//! sub.unsubscribe();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod batch;
pub mod host;
pub mod storage;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MirrorError, Result};
pub use config::{StoreOptions, StoreOptionsBuilder, DEFAULT_NAMESPACE, DEFAULT_TTL_HOURS};
pub use record::{StateRecord, RECORD_TAG};
pub use batch::{ManualScheduler, Scheduler, WriteBatcher};
pub use host::{ChangeEvent, MemoryBackend, StorageBackend, WatchToken};
pub use storage::{prune, StorageAdapter};
pub use store::{Store, Subscription};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of mirrorkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
