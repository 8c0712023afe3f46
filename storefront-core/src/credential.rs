//! Process-wide holder of the current access credential.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};

/// In-memory bearer token store. Nothing is persisted across process restarts.
///
/// The gateway is the only writer during normal operation: it stores the token
/// returned by a successful refresh and clears it when a refresh fails. Login and
/// logout flows of the embedding application go through [`crate::RequestGateway::login`]
/// and [`crate::RequestGateway::logout`].
#[derive(Default)]
pub struct CredentialStore {
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("present", &self.is_present())
            .finish()
    }
}

impl CredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current token, if any.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map(|token| token.expose_secret().to_string())
    }

    /// Replaces the current token.
    pub fn set(&self, token: &str) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(SecretString::from(token.to_string()));
    }

    /// Forgets the current token.
    pub fn clear(&self) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    /// Whether a token is currently held.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }
}
