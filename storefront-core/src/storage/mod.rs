//! Session-scoped key/value storage used to persist checkout attempts.

pub mod error;
mod file;
mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use file::FileSessionStore;
pub use memory::InMemorySessionStore;
pub use traits::SessionStore;
