//! Record codec
//!
//! Encoding and decoding of [`StateRecord`]s as JSON text, plus the
//! value-equality check the store engine uses for its idempotence
//! guarantee.
//!
//! Decoding is total: absent input, malformed JSON, and records carrying
//! a foreign tag all come back as `None`. Persisted garbage must read as
//! "no record present", never as an error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{MirrorError, Result};

use super::{StateRecord, RECORD_TAG};

// =============================================================================
// Record Encoding/Decoding
// =============================================================================

/// Encode a record to JSON text.
///
/// Fails when the state graph cannot be represented in JSON (e.g. a map
/// keyed by a non-string type). Callers report the failure on the
/// diagnostic channel and skip the physical write; encoding is never
/// allowed to panic the store.
pub fn encode<T: Serialize>(record: &StateRecord<T>) -> Result<String> {
    serde_json::to_string(record).map_err(MirrorError::from)
}

/// Decode JSON text into a record.
///
/// Returns `None` for absent input, malformed JSON, a shape that is not
/// a record envelope, or an envelope whose tag is not [`RECORD_TAG`]
/// (an unrelated entry sharing the keyspace).
pub fn decode<T: DeserializeOwned>(text: Option<&str>) -> Option<StateRecord<T>> {
    let text = text?;
    let record: StateRecord<T> = serde_json::from_str(text).ok()?;

    if record.tag != RECORD_TAG {
        return None;
    }

    Some(record)
}

// =============================================================================
// State Equality
// =============================================================================

/// Deep value equality between two optional states, computed at the
/// serialized level.
///
/// Both sides are projected to `serde_json::Value` (absent state
/// projects to JSON null, matching how an absent record reads back).
/// A state that fails to project is treated as unequal so the write
/// path proceeds and the failure surfaces through the codec.
pub fn states_equal<T: Serialize>(a: Option<&T>, b: Option<&T>) -> bool {
    match (project(a), project(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn project<T: Serialize>(state: Option<&T>) -> Option<Value> {
    match state {
        None => Some(Value::Null),
        Some(value) => serde_json::to_value(value).ok(),
    }
}
