//! Storage trait definitions.

use crate::StorageResult;

/// A key/value store for client-held data.
///
/// Two tiers implement this: an ephemeral one that lives as long as the
/// process and a persistent one backed by a file under `~/.hwlg`.
pub trait ClientStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// List all stored keys.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Remove every entry in this tier.
    fn clear(&self) -> StorageResult<()>;
}
