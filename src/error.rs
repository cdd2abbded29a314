//! Error types for slotkv
//!
//! Provides a unified error type for all operations.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias using SlotError
pub type Result<T> = std::result::Result<T, SlotError>;

/// Unified error type for slotkv operations
#[derive(Debug, Error)]
pub enum SlotError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Key Codec Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key component: {0}")]
    InvalidKeyComponent(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Key overflow: {0}")]
    KeyOverflow(String),

    #[error("Key is empty")]
    EmptyKey,

    #[error("Key decode error: {0}")]
    KeyDecode(String),

    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    #[error("Invalid storage name: {0:?}")]
    InvalidName(String),

    #[error("Storage {name:?} is already open with a different value type or format")]
    TypeMismatch { name: String },

    /// A memoized failure handed out to every caller of one registry entry.
    #[error(transparent)]
    Shared(#[from] Arc<SlotError>),
}

impl SlotError {
    /// Look through any `Shared` wrappers to the original error.
    pub fn root(&self) -> &SlotError {
        match self {
            SlotError::Shared(inner) => inner.root(),
            other => other,
        }
    }
}
