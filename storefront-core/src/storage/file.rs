//! File-backed session store for native hosts.
//!
//! All keys live in one JSON object. Writes go to a sibling temporary file that is
//! then renamed over the original, so a crash never leaves a torn file behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{SessionStore, StorageError, StorageResult};

/// Session store persisted as a JSON document on disk.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Opens the store at `path`, creating parent directories as needed.
    /// The file itself is created on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                StorageError::Write(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| StorageError::Serialization(err.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(StorageError::Read(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(values)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|err| {
            StorageError::Write(format!("failed to write {}: {err}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            StorageError::Write(format!("failed to replace {}: {err}", self.path.display()))
        })
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> StorageResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?;
        let mut values = self.load()?;
        apply(&mut values);
        self.persist(&values)
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}
