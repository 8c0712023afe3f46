use thiserror::Error;

use crate::storage::StorageError;

/// Error outputs from `storefront-core`
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum StorefrontError {
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that was rejected.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Unexpected error serializing information
    #[error("serialization_error: {error}")]
    SerializationError {
        /// Details of the failure.
        error: String,
    },
    /// A remote call failed. See [`ApiError`] for the failure classes.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The session store could not be read or written
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Classified failure of a call against the commerce backend.
///
/// The classes drive the retry policy of the layers above the transport:
/// `AuthExpired` triggers a credential refresh, `RateLimited` pauses polling and
/// `NetworkOrServerError` is transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum ApiError {
    /// The access credential is missing, invalid or expired.
    #[error("auth_expired")]
    AuthExpired,
    /// The backend asked the client to slow down.
    #[error("rate_limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// How long the backend asked us to wait before the next call.
        retry_after_seconds: u64,
    },
    /// The requested resource does not exist.
    #[error("not_found")]
    NotFound,
    /// The backend rejected the payload.
    #[error("validation_failed: {message}")]
    ValidationFailed {
        /// Message reported by the backend.
        message: String,
    },
    /// Connectivity failure, timeout or unexpected server response.
    #[error("network_error: {url} (status: {status:?}): {error}")]
    NetworkOrServerError {
        /// The URL that was called.
        url: String,
        /// The HTTP status, when a response was received.
        status: Option<u16>,
        /// Details of the failure.
        error: String,
    },
}

impl ApiError {
    /// Whether the failure is worth retrying later without user action.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkOrServerError { .. } | Self::RateLimited { .. })
    }
}

impl From<serde_json::Error> for StorefrontError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_strings() {
        assert_eq!(ApiError::AuthExpired.to_string(), "auth_expired");
        assert_eq!(
            ApiError::RateLimited {
                retry_after_seconds: 2
            }
            .to_string(),
            "rate_limited: retry after 2s"
        );
        let err = StorefrontError::InvalidInput {
            attribute: "base_url".to_string(),
            reason: "must use https".to_string(),
        };
        assert_eq!(err.to_string(), "invalid_input_base_url: must use https");
    }

    #[test]
    fn test_transient_classes() {
        assert!(ApiError::RateLimited {
            retry_after_seconds: 1
        }
        .is_transient());
        assert!(ApiError::NetworkOrServerError {
            url: "https://shop.example/orders".to_string(),
            status: Some(503),
            error: "unavailable".to_string(),
        }
        .is_transient());
        assert!(!ApiError::AuthExpired.is_transient());
        assert!(!ApiError::NotFound.is_transient());
    }
}
