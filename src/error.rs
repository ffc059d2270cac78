//! Error types for mirrorkv
//!
//! Provides a unified error type for all operations.
//!
//! Nothing in this crate treats an error as fatal: persistence failures
//! degrade to in-memory-only state and misuse of a suspended store is a
//! warned no-op. The variants below exist so the degradation points can
//! report *what* went wrong on the diagnostic channel.

use thiserror::Error;

/// Result type alias using MirrorError
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Unified error type for mirrorkv operations
#[derive(Debug, Error)]
pub enum MirrorError {
    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("store is suspended: {0}")]
    Suspended(String),
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Serialization(err.to_string())
    }
}
