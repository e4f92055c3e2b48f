//! Model persistence by name
//!
//! The classifier serializes itself to an opaque byte blob; a `ModelStore`
//! only has to keep blobs under names and hand them back unchanged.
//! Two backings are provided: an in-memory map and a directory of
//! `<name>.json` files.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ModelError;

/// Named blob storage used by `Classifier::save` / `Classifier::load`
pub trait ModelStore: Send + Sync {
    fn save(&self, name: &str, blob: &[u8]) -> Result<(), ModelError>;

    /// # Errors
    /// `ModelError::NotFound` when nothing is stored under `name`
    fn load(&self, name: &str) -> Result<Vec<u8>, ModelError>;
}

/// Non-persistent store, mainly for tests and single-session use
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelStore for MemoryStore {
    fn save(&self, name: &str, blob: &[u8]) -> Result<(), ModelError> {
        let mut blobs = self.blobs.lock().map_err(|_| ModelError::StatePoisoned)?;
        blobs.insert(name.to_string(), blob.to_vec());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, ModelError> {
        let blobs = self.blobs.lock().map_err(|_| ModelError::StatePoisoned)?;
        blobs.get(name).cloned().ok_or_else(|| ModelError::NotFound {
            name: name.to_string(),
        })
    }
}

/// Directory of `<name>.json` blobs
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ModelError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(ModelError::Io {
                details: format!("invalid model name '{}'", name),
            });
        }
        Ok(self.directory.join(format!("{}.json", name)))
    }
}

impl ModelStore for FileStore {
    fn save(&self, name: &str, blob: &[u8]) -> Result<(), ModelError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.directory)?;
        fs::write(&path, blob)?;
        log::info!("[FileStore] Wrote {} bytes to {:?}", blob.len(), path);
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, ModelError> {
        let path = self.path_for(name)?;
        fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ModelError::NotFound {
                name: name.to_string(),
            },
            _ => ModelError::from(err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.save("m", b"abc").unwrap();
        assert_eq!(store.load("m").unwrap(), b"abc");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_missing() {
        let store = MemoryStore::new();
        assert_eq!(
            store.load("nope"),
            Err(ModelError::NotFound {
                name: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("models"));

        store.save("blow-model", b"{\"x\":1}").unwrap();
        assert_eq!(store.load("blow-model").unwrap(), b"{\"x\":1}");
        assert!(dir.path().join("models/blow-model.json").exists());
    }

    #[test]
    fn test_file_store_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        match store.load("absent") {
            Err(ModelError::NotFound { name }) => assert_eq!(name, "absent"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_file_store_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for bad in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(store.save(bad, b"x"), Err(ModelError::Io { .. })), "{}", bad);
        }
    }
}
