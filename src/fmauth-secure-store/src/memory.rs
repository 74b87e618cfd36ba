//! In-memory backend.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::{Result, SecureStore, StoreKey};

/// Secret store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bundle: String,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store for the given namespace.
    pub fn new(bundle: impl Into<String>) -> Self {
        Self {
            bundle: bundle.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SecureStore for MemoryStore {
    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.qualified(&self.bundle), value.to_string());
        Ok(())
    }

    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .get(&key.qualified(&self.bundle))
            .cloned())
    }

    fn delete(&self, key: StoreKey) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .remove(&key.qualified(&self.bundle))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let store = MemoryStore::new("com.example");
        store.set(StoreKey::FileMakerToken, "abc").unwrap();
        assert_eq!(
            store.get(StoreKey::FileMakerToken).unwrap().as_deref(),
            Some("abc")
        );
        assert!(store.delete(StoreKey::FileMakerToken).unwrap());
        assert!(store.get(StoreKey::FileMakerToken).unwrap().is_none());
    }

    #[test]
    fn test_delete_absent_key_is_ok_for_every_key() {
        let store = MemoryStore::new("com.example");
        for key in StoreKey::ALL {
            assert!(matches!(store.delete(key), Ok(false)), "{key}");
        }
    }

    #[test]
    fn test_clear_removes_all_known_keys() {
        let store = MemoryStore::new("com.example");
        for key in StoreKey::ALL {
            store.set(key, "v").unwrap();
        }
        assert_eq!(store.len(), StoreKey::ALL.len());
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryStore::new("com.example");
        store.set(StoreKey::SavedUsername, "a").unwrap();
        store.set(StoreKey::SavedUsername, "b").unwrap();
        assert_eq!(store.read(StoreKey::SavedUsername).as_deref(), Some("b"));
        assert_eq!(store.len(), 1);
    }
}
