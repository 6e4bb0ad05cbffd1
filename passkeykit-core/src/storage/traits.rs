//! Platform interface for session storage tiers.

use super::error::StorageResult;

/// String key-value store used for one storage tier.
///
/// Implementations are shared mutable state across every tab of an origin.
/// No locking is expected: concurrent writers race with last-write-wins.
pub trait KeyValueStore {
    /// Reads the value at `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Deletes the value at `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}
