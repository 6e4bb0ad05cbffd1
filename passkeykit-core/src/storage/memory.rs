//! In-memory storage tier.
//!
//! Used by native hosts that have no browser storage and by the test suite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{KeyValueStore, StorageError, StorageResult};

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every key currently stored, in lexical order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store mutex is poisoned.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let guard = self
            .items
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?;
        Ok(guard.keys().cloned().collect())
    }

    /// Returns `true` if no key is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store mutex is poisoned.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.keys()?.is_empty())
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .items
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.items
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStorage::new();
        assert_eq!(store.get_item("a").unwrap(), None);

        store.set_item("a", "1").unwrap();
        store.set_item("a", "2").unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("2"));

        store.remove_item("a").unwrap();
        store.remove_item("a").unwrap();
        assert!(store.is_empty().unwrap());
    }
}
