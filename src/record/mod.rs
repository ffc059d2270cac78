//! Record Module
//!
//! The persisted envelope pairing a state value with expiration
//! metadata and a type tag.
//!
//! ## Responsibilities
//! - Define the `StateRecord` wire shape
//! - Encode/decode records as JSON text (codec)
//! - Compute and check record time-to-live (expiry)
//!
//! ## Wire Format (JSON text)
//! ```text
//! {"type":"<tag>","expires":<integer-ms-epoch-or-0>,"state":<json-value>}
//! ```
//!
//! The `type` tag distinguishes records owned by this crate from
//! unrelated entries sharing the same storage keyspace. `expires` is an
//! absolute instant in milliseconds since the epoch; `0` means the
//! record never expires.

pub mod codec;
pub mod expiry;

use serde::{Deserialize, Serialize};

/// Tag identifying records that belong to this crate
pub const RECORD_TAG: &str = "mirrorkv";

/// Persisted envelope for a state value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord<T> {
    /// Record discriminator; always [`RECORD_TAG`] for records this
    /// crate writes. Decoding validates it.
    #[serde(rename = "type")]
    pub tag: String,

    /// Absolute expiry instant in ms since the epoch; `0` = never
    pub expires: u64,

    /// The wrapped state value
    pub state: T,
}

impl<T> StateRecord<T> {
    /// Create a record carrying `state`, expiring at `expires`
    pub fn new(state: T, expires: u64) -> Self {
        Self {
            tag: RECORD_TAG.to_string(),
            expires,
            state,
        }
    }
}
