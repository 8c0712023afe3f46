//! Platform interface for session-scoped storage.

use super::error::StorageResult;

/// String key/value store scoped to one browsing session.
///
/// Values survive reloads of the storefront within the session and are removed
/// explicitly. Browser hosts back this with `sessionStorage`; native hosts use
/// [`super::FileSessionStore`] or [`super::InMemorySessionStore`].
pub trait SessionStore: Send + Sync {
    /// Reads the value stored under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, key: &str) -> StorageResult<()>;
}
