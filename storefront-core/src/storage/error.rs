//! Error types for session storage.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by session store implementations.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum StorageError {
    /// The backing medium could not be read.
    #[error("session store read error: {0}")]
    Read(String),

    /// The backing medium could not be written.
    #[error("session store write error: {0}")]
    Write(String),

    /// Stored bytes could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding the store was poisoned.
    #[error("session store lock error: {0}")]
    Lock(String),
}
